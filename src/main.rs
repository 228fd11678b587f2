use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use cosmo_voice::voice::{
    AudioAssetStore, OutputMode, PlaybackController, PlaybackEvent, SpeakerOutput,
    SpeechCaptureController, SpeechToText, WhisperRecognizer,
};
use cosmo_voice::{
    Config, DialogueClient, DialogueService, FailureReason, SessionOptions, SessionSnapshot,
    SessionState, SpeechSynthesizer, SynthesisClient, UserIntent, VoiceSession,
};

/// Cosmo - talk to the cosmic dialogue server out loud
#[derive(Parser)]
#[command(name = "cosmo", version, about)]
struct Cli {
    /// Path to a config file (defaults to ~/.config/cosmo/config.toml)
    #[arg(short, long, env = "COSMO_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive voice session (default)
    Talk,
    /// Check configuration and dialogue server health
    Check,
    /// Synthesize text and play it
    Say {
        /// Text to speak
        #[arg(default_value = "Hey there, this is Cosmo. Can you hear me?")]
        text: String,
    },
    /// Send text to the dialogue server and speak the reply
    Ask {
        /// Message to send
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,cosmo_voice=info",
        1 => "info,cosmo_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Talk) {
        Command::Talk => talk(&config).await,
        Command::Check => check(&config).await,
        Command::Say { text } => say(&config, &text).await,
        Command::Ask { text } => ask(&config, &text).await,
    }
}

/// Interactive session on the main thread (cpal streams are not `Send`)
#[allow(clippy::future_not_send)]
async fn talk(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(AudioAssetStore::new(config.playback.cache_dir.as_deref())?);
    let dialogue: Arc<dyn DialogueService> = Arc::new(DialogueClient::new(&config.dialogue)?);
    let synthesis: Arc<dyn SpeechSynthesizer> =
        Arc::new(SynthesisClient::new(&config.synthesis, Arc::clone(&store))?);

    let stt = SpeechToText::new(
        config.speech.openai_api_key.clone(),
        config.speech.stt_model.clone(),
    )?;
    let capture = SpeechCaptureController::new(Box::new(WhisperRecognizer::new(stt)));
    let playback = PlaybackController::new(
        Box::new(SpeakerOutput::new()?),
        Arc::clone(&store),
        OutputMode::default(),
    );

    let mut session = VoiceSession::new(
        capture,
        playback,
        dialogue,
        synthesis,
        SessionOptions {
            locale: config.speech.locale.clone(),
            auto_submit: config.speech.auto_submit,
        },
    );

    let (intents_tx, intents_rx) = mpsc::channel(16);
    tokio::spawn(read_intents(intents_tx));
    tokio::spawn(render(session.subscribe()));

    println!("Cosmo is here. Press Enter to talk, Enter again to send.");
    println!("Type a message to send it as text, 'a' to dismiss an error, 'q' to quit.\n");

    session.run(intents_rx).await;
    Ok(())
}

/// Map terminal input to session intents
async fn read_intents(intents: mpsc::Sender<UserIntent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => Ok(None),
        };

        let intent = match line {
            Ok(Some(line)) => match line.trim() {
                "" => UserIntent::Toggle,
                "a" => UserIntent::Acknowledge,
                "q" => UserIntent::Shutdown,
                text => UserIntent::Submit(text.to_string()),
            },
            Ok(None) => UserIntent::Shutdown,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read terminal input");
                UserIntent::Shutdown
            }
        };

        let done = intent == UserIntent::Shutdown;
        if intents.send(intent).await.is_err() || done {
            break;
        }
    }
}

/// Print state changes as they happen
async fn render(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut shown_state = SessionState::Idle;
    let mut shown_reply: Option<String> = None;

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();

        let reply = snapshot.last_turn.as_ref().and_then(|t| t.reply_text().map(ToString::to_string));
        if reply.is_some() && reply != shown_reply {
            if let Some(turn) = &snapshot.last_turn {
                println!("you:   {}", turn.request_text());
            }
            if let Some(text) = &reply {
                println!("cosmo: {text}");
            }
        }
        shown_reply = reply;

        if snapshot.state == shown_state {
            continue;
        }

        match &snapshot.state {
            SessionState::Idle => println!("[ready]"),
            SessionState::Listening => println!("[listening... press Enter to send]"),
            SessionState::AwaitingReply => println!("[thinking...]"),
            SessionState::Synthesizing => println!("[finding the words...]"),
            SessionState::Speaking => println!("[speaking]"),
            SessionState::Failed(reason) => {
                println!("[error] {} (press 'a' to dismiss)", reason.user_message());
            }
        }
        shown_state = snapshot.state;
    }
}

/// Check configuration and dialogue server health
async fn check(config: &Config) -> anyhow::Result<()> {
    println!("Dialogue server: {}", config.dialogue.base_url);
    let client = DialogueClient::new(&config.dialogue)?;
    match client.health_check().await {
        Ok(()) => println!("  health: ok"),
        Err(e) => println!("  health: FAILED ({e})"),
    }

    println!("Synthesis: {}", config.synthesis.base_url);
    println!("  voice: {}", config.synthesis.voice_id);
    println!("  model: {}", config.synthesis.model_id);
    println!(
        "  api key: {}",
        if config.synthesis.api_key.is_some() { "set" } else { "MISSING (ELEVENLABS_API_KEY)" }
    );

    println!("Speech recognition: {}", config.speech.stt_model);
    println!("  locale: {}", config.speech.locale);
    println!(
        "  api key: {}",
        if config.speech.openai_api_key.is_some() { "set" } else { "MISSING (OPENAI_API_KEY)" }
    );

    Ok(())
}

/// Synthesize text and play it
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("nothing to say");
    }

    let store = Arc::new(AudioAssetStore::new(config.playback.cache_dir.as_deref())?);
    let synthesis = SynthesisClient::new(&config.synthesis, Arc::clone(&store))?;

    println!("Synthesizing speech...");
    let asset = synthesis
        .synthesize(text)
        .await
        .map_err(|e| anyhow::anyhow!(FailureReason::from(e).user_message()))?;

    speak(store, asset).await
}

/// One text round without the microphone
async fn ask(config: &Config, text: &str) -> anyhow::Result<()> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("message must not be blank");
    }

    let store = Arc::new(AudioAssetStore::new(config.playback.cache_dir.as_deref())?);
    let dialogue = DialogueClient::new(&config.dialogue)?;
    let synthesis = SynthesisClient::new(&config.synthesis, Arc::clone(&store))?;

    let reply = dialogue
        .request_reply(text)
        .await
        .map_err(|e| anyhow::anyhow!(FailureReason::from(e).user_message()))?;
    println!("cosmo: {reply}");

    let asset = synthesis
        .synthesize(&reply)
        .await
        .map_err(|e| anyhow::anyhow!(FailureReason::from(e).user_message()))?;

    speak(store, asset).await
}

async fn speak(store: Arc<AudioAssetStore>, asset: cosmo_voice::voice::AudioAsset) -> anyhow::Result<()> {
    let mut playback = PlaybackController::new(
        Box::new(SpeakerOutput::new()?),
        store,
        OutputMode::default(),
    );

    playback
        .play(asset)
        .map_err(|e| anyhow::anyhow!(FailureReason::from(e).user_message()))?;

    match playback.next_event().await {
        PlaybackEvent::Finished => Ok(()),
        PlaybackEvent::Failed(e) => Err(anyhow::anyhow!(FailureReason::from(e).user_message())),
    }
}
