//! Voice session - the conversation state machine
//!
//! Sequences capture → dialogue → synthesis → playback for one round at a
//! time. The session is the only place that changes [`SessionState`];
//! controllers and remote calls only produce [`SessionEvent`]s.
//!
//! Each round carries a [`RoundToken`]. Dialogue and synthesis requests run
//! in the background and report back tagged with the token they were issued
//! under; results for any other token are dropped, so an abandoned round can
//! never affect a later one.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::dialogue::DialogueService;
use crate::error::{DialogueError, FailureReason, SynthesisError};
use crate::synthesis::SpeechSynthesizer;
use crate::voice::{
    AudioAsset, CaptureEvent, CaptureEventKind, PlaybackController, PlaybackEvent,
    SpeechCaptureController,
};

/// Identifies one round of conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundToken(u64);

impl RoundToken {
    /// The token following this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoundToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the session is in a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the user
    Idle,
    /// Capturing speech
    Listening,
    /// Waiting for the dialogue reply
    AwaitingReply,
    /// Waiting for synthesized audio
    Synthesizing,
    /// Playing the reply
    Speaking,
    /// The round failed; waiting for acknowledgement
    Failed(FailureReason),
}

impl SessionState {
    /// Whether a round is in progress past capture
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::AwaitingReply | Self::Synthesizing | Self::Speaking)
    }
}

/// One request/reply exchange with the dialogue service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueTurn {
    request_text: String,
    reply_text: Option<String>,
    error: Option<DialogueError>,
}

impl DialogueTurn {
    fn new(request_text: String) -> Self {
        Self {
            request_text,
            reply_text: None,
            error: None,
        }
    }

    /// Text sent to the dialogue service
    #[must_use]
    pub fn request_text(&self) -> &str {
        &self.request_text
    }

    /// Reply, once received
    #[must_use]
    pub fn reply_text(&self) -> Option<&str> {
        self.reply_text.as_deref()
    }

    /// Failure, if the request failed
    #[must_use]
    pub const fn error(&self) -> Option<&DialogueError> {
        self.error.as_ref()
    }

    /// Whether the turn has a reply or an error
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.reply_text.is_some() || self.error.is_some()
    }
}

/// What the presentation layer sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current state
    pub state: SessionState,
    /// Current round
    pub round: RoundToken,
    /// Latest recognized text of the current round
    pub partial_transcript: Option<String>,
    /// Dialogue exchange of the current round
    pub last_turn: Option<DialogueTurn>,
}

/// Input to the session's transition function
#[derive(Debug)]
pub enum SessionEvent {
    /// Speech capture produced an event
    Capture(CaptureEvent),
    /// Playback finished or failed
    Playback(PlaybackEvent),
    /// A dialogue request settled
    ReplyReady {
        /// Round the request was issued in
        round: RoundToken,
        /// Reply text or failure
        result: Result<String, DialogueError>,
    },
    /// A synthesis request settled
    AssetReady {
        /// Round the request was issued in
        round: RoundToken,
        /// Playable asset or failure
        result: Result<AudioAsset, SynthesisError>,
    },
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    /// Start a new round by listening
    StartListening,
    /// Stop listening and submit
    StopListening,
    /// Start when not listening, stop when listening
    Toggle,
    /// Start a new round from typed text
    Submit(String),
    /// Dismiss a failure
    Acknowledge,
    /// End the session
    Shutdown,
}

/// Session behavior settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Recognition locale
    pub locale: String,
    /// Submit as soon as a final transcript arrives
    pub auto_submit: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            auto_submit: false,
        }
    }
}

/// Orchestrates one microphone, one speaker, and the remote services
pub struct VoiceSession {
    capture: SpeechCaptureController,
    playback: PlaybackController,
    dialogue: Arc<dyn DialogueService>,
    synthesis: Arc<dyn SpeechSynthesizer>,
    options: SessionOptions,
    state: SessionState,
    round: RoundToken,
    partial_transcript: Option<String>,
    turn: Option<DialogueTurn>,
    last_error: Option<FailureReason>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl VoiceSession {
    /// Assemble a session from its collaborators
    #[must_use]
    pub fn new(
        capture: SpeechCaptureController,
        playback: PlaybackController,
        dialogue: Arc<dyn DialogueService>,
        synthesis: Arc<dyn SpeechSynthesizer>,
        options: SessionOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            state: SessionState::Idle,
            round: RoundToken::default(),
            partial_transcript: None,
            last_turn: None,
        });

        Self {
            capture,
            playback,
            dialogue,
            synthesis,
            options,
            state: SessionState::Idle,
            round: RoundToken::default(),
            partial_transcript: None,
            turn: None,
            last_error: None,
            events_tx,
            events_rx,
            snapshot_tx,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current round
    #[must_use]
    pub const fn round(&self) -> RoundToken {
        self.round
    }

    /// Most recent failure, kept after acknowledgement
    #[must_use]
    pub const fn last_error(&self) -> Option<&FailureReason> {
        self.last_error.as_ref()
    }

    /// Dialogue exchange of the current round
    #[must_use]
    pub const fn turn(&self) -> Option<&DialogueTurn> {
        self.turn.as_ref()
    }

    /// Watch state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Begin a new round by listening
    ///
    /// Any round in progress is torn down first; a failure is acknowledged.
    pub async fn start_listening(&mut self) {
        self.begin_round();

        match self.capture.start(&self.options.locale).await {
            Ok(()) => self.transition(SessionState::Listening),
            Err(e) => self.fail(e.into()).await,
        }
    }

    /// Stop listening and submit the transcript
    ///
    /// A blank or missing transcript ends the round quietly.
    pub async fn stop_listening(&mut self) {
        if self.state != SessionState::Listening {
            tracing::debug!(state = ?self.state, "stop requested while not listening");
            return;
        }

        self.transition(SessionState::AwaitingReply);

        match self.capture.stop().await {
            Ok(Some(transcript)) if !transcript.is_blank() => {
                self.dispatch_dialogue(transcript.text().trim().to_string());
            }
            Ok(_) => {
                tracing::info!(round = %self.round, "nothing said, round ends");
                self.transition(SessionState::Idle);
            }
            Err(e) => self.fail(e.into()).await,
        }
    }

    /// Begin a new round from typed text, skipping capture
    pub async fn submit_text(&mut self, text: &str) {
        self.begin_round();
        if let Err(e) = self.capture.stop().await {
            tracing::debug!(error = %e, "capture stop before text round failed");
        }

        let text = text.trim();
        if text.is_empty() {
            self.transition(SessionState::Idle);
            return;
        }

        self.transition(SessionState::AwaitingReply);
        self.dispatch_dialogue(text.to_string());
    }

    /// Dismiss a failure and return to idle
    ///
    /// Returns whether there was a failure to dismiss. Resources were already
    /// released on entering the failed state.
    pub fn acknowledge(&mut self) -> bool {
        if matches!(self.state, SessionState::Failed(_)) {
            self.transition(SessionState::Idle);
            true
        } else {
            false
        }
    }

    /// Apply one event to the state machine
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Capture(event) => self.on_capture(event).await,
            SessionEvent::Playback(event) => self.on_playback(event).await,
            SessionEvent::ReplyReady { round, result } => self.on_reply(round, result).await,
            SessionEvent::AssetReady { round, result } => self.on_asset(round, result).await,
        }
    }

    /// Wait for the next event from any collaborator
    pub async fn next_event(&mut self) -> SessionEvent {
        tokio::select! {
            Some(event) = self.events_rx.recv() => event,
            event = self.capture.next_event() => SessionEvent::Capture(event),
            event = self.playback.next_event() => SessionEvent::Playback(event),
        }
    }

    /// Wait for one event and apply it
    pub async fn process_next(&mut self) {
        let event = self.next_event().await;
        self.handle_event(event).await;
    }

    /// Drive the session from user intents until shutdown
    pub async fn run(&mut self, mut intents: mpsc::Receiver<UserIntent>) {
        enum Next {
            Intent(Option<UserIntent>),
            Event(SessionEvent),
        }

        loop {
            let next = tokio::select! {
                intent = intents.recv() => Next::Intent(intent),
                event = self.next_event() => Next::Event(event),
            };

            match next {
                Next::Event(event) => self.handle_event(event).await,
                Next::Intent(None | Some(UserIntent::Shutdown)) => break,
                Next::Intent(Some(intent)) => self.apply(intent).await,
            }
        }

        self.shutdown().await;
    }

    /// Apply a user intent
    pub async fn apply(&mut self, intent: UserIntent) {
        tracing::debug!(?intent, state = ?self.state, "user intent");
        match intent {
            UserIntent::StartListening => self.start_listening().await,
            UserIntent::StopListening => self.stop_listening().await,
            UserIntent::Toggle => {
                if self.state == SessionState::Listening {
                    self.stop_listening().await;
                } else {
                    self.start_listening().await;
                }
            }
            UserIntent::Submit(text) => self.submit_text(&text).await,
            UserIntent::Acknowledge => {
                self.acknowledge();
            }
            UserIntent::Shutdown => self.shutdown().await,
        }
    }

    /// Release the speaker and microphone
    pub async fn shutdown(&mut self) {
        self.playback.stop();
        self.capture.teardown().await;
        self.round = self.round.next();
        self.turn = None;
        self.partial_transcript = None;
        self.transition(SessionState::Idle);
        tracing::info!("voice session shut down");
    }

    fn begin_round(&mut self) {
        match &self.state {
            SessionState::Failed(_) => {
                self.acknowledge();
            }
            state if state.is_busy() => {
                tracing::info!(round = %self.round, state = ?state, "superseding round in progress");
                self.playback.stop();
            }
            _ => {}
        }

        self.round = self.round.next();
        self.turn = None;
        self.partial_transcript = None;
        tracing::debug!(round = %self.round, "round started");
    }

    async fn on_capture(&mut self, event: CaptureEvent) {
        if self.state != SessionState::Listening || event.capture_id != self.capture.capture_id() {
            tracing::debug!(capture_id = event.capture_id, "dropping capture event for inactive capture");
            return;
        }

        match event.kind {
            CaptureEventKind::Partial(text) => {
                self.partial_transcript = Some(text);
                self.publish();
            }
            CaptureEventKind::Final(text) => {
                self.partial_transcript = Some(text);
                self.publish();
                if self.options.auto_submit {
                    self.stop_listening().await;
                }
            }
            CaptureEventKind::Error(e) => self.fail(e.into()).await,
        }
    }

    async fn on_playback(&mut self, event: PlaybackEvent) {
        if self.state != SessionState::Speaking {
            tracing::debug!(?event, state = ?self.state, "dropping playback event outside speaking");
            return;
        }

        match event {
            PlaybackEvent::Finished => {
                tracing::info!(round = %self.round, "round complete");
                self.transition(SessionState::Idle);
            }
            PlaybackEvent::Failed(e) => self.fail(e.into()).await,
        }
    }

    async fn on_reply(&mut self, round: RoundToken, result: Result<String, DialogueError>) {
        if round != self.round || self.state != SessionState::AwaitingReply {
            tracing::debug!(%round, current = %self.round, "discarding stale dialogue result");
            return;
        }

        let result = result.and_then(|reply| {
            if reply.trim().is_empty() {
                Err(DialogueError::EmptyReply)
            } else {
                Ok(reply)
            }
        });

        match result {
            Ok(reply) => {
                if let Some(turn) = self.turn.as_mut() {
                    turn.reply_text = Some(reply.clone());
                }
                self.transition(SessionState::Synthesizing);
                self.dispatch_synthesis(reply);
            }
            Err(e) => {
                tracing::warn!(%round, error = %e, "dialogue failed");
                if let Some(turn) = self.turn.as_mut() {
                    turn.error = Some(e.clone());
                }
                self.fail(e.into()).await;
            }
        }
    }

    async fn on_asset(&mut self, round: RoundToken, result: Result<AudioAsset, SynthesisError>) {
        if round != self.round || self.state != SessionState::Synthesizing {
            tracing::debug!(%round, current = %self.round, "discarding stale synthesis result");
            if let Ok(asset) = result {
                self.playback.discard(asset);
            }
            return;
        }

        match result {
            Ok(asset) => {
                self.transition(SessionState::Speaking);
                if let Err(e) = self.playback.play(asset) {
                    self.fail(e.into()).await;
                }
            }
            Err(e) => {
                tracing::warn!(%round, error = %e, "synthesis failed");
                self.fail(e.into()).await;
            }
        }
    }

    fn dispatch_dialogue(&mut self, text: String) {
        tracing::info!(round = %self.round, text = %text, "sending transcript");
        self.turn = Some(DialogueTurn::new(text.clone()));
        self.publish();

        let round = self.round;
        let dialogue = Arc::clone(&self.dialogue);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = dialogue.request_reply(&text).await;
            if events.send(SessionEvent::ReplyReady { round, result }).is_err() {
                tracing::debug!(%round, "session gone before dialogue reply");
            }
        });
    }

    fn dispatch_synthesis(&self, text: String) {
        tracing::debug!(round = %self.round, "requesting synthesis");

        let round = self.round;
        let synthesis = Arc::clone(&self.synthesis);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = synthesis.synthesize(&text).await;
            if events.send(SessionEvent::AssetReady { round, result }).is_err() {
                tracing::debug!(%round, "session gone before synthesis result");
            }
        });
    }

    async fn fail(&mut self, reason: FailureReason) {
        tracing::error!(round = %self.round, error = %reason, "round failed");

        self.playback.stop();
        if let Err(e) = self.capture.stop().await {
            tracing::debug!(error = %e, "capture stop on failure failed");
        }

        self.last_error = Some(reason.clone());
        self.transition(SessionState::Failed(reason));
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(round = %self.round, from = ?self.state, to = ?next, "state change");
        }
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.state.clone(),
            round: self.round,
            partial_transcript: self.partial_transcript.clone(),
            last_turn: self.turn.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_tokens_increase() {
        let first = RoundToken::default();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.to_string(), "1");
    }

    #[test]
    fn test_busy_states() {
        assert!(SessionState::AwaitingReply.is_busy());
        assert!(SessionState::Synthesizing.is_busy());
        assert!(SessionState::Speaking.is_busy());
        assert!(!SessionState::Idle.is_busy());
        assert!(!SessionState::Listening.is_busy());
    }

    #[test]
    fn test_dialogue_turn_completion() {
        let mut turn = DialogueTurn::new("what is time".to_string());
        assert!(!turn.is_complete());
        turn.reply_text = Some("Whoa".to_string());
        assert!(turn.is_complete());
        assert_eq!(turn.request_text(), "what is time");
        assert_eq!(turn.reply_text(), Some("Whoa"));
        assert!(turn.error().is_none());
    }
}
