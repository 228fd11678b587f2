//! Configuration management for Cosmo voice
//!
//! Configuration is resolved once at startup (env > toml > default),
//! validated, and then passed by value into the clients that need it.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::{Error, Result};

/// Default dialogue server
const DEFAULT_DIALOGUE_URL: &str = "http://localhost:3000";

/// Default chat endpoint path
const DEFAULT_CHAT_PATH: &str = "/chat";

/// Default ElevenLabs API base URL
const DEFAULT_SYNTHESIS_URL: &str = "https://api.elevenlabs.io";

/// Default ElevenLabs voice (Rachel)
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Default ElevenLabs model
const DEFAULT_MODEL_ID: &str = "eleven_monolingual_v1";

/// Default request timeout for dialogue and synthesis calls
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cosmo voice configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Dialogue endpoint configuration
    pub dialogue: DialogueConfig,

    /// Speech synthesis configuration
    pub synthesis: SynthesisConfig,

    /// Speech recognition configuration
    pub speech: SpeechConfig,

    /// Audio playback configuration
    pub playback: PlaybackConfig,
}

/// Dialogue endpoint configuration
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    /// Base URL of the dialogue server
    pub base_url: Url,

    /// Chat path relative to the base URL
    pub chat_path: String,

    /// Request timeout
    pub timeout: Duration,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// ElevenLabs API key
    pub api_key: Option<SecretString>,

    /// Provider base URL
    pub base_url: Url,

    /// Voice identifier
    pub voice_id: String,

    /// Model identifier
    pub model_id: String,

    /// Voice stability (0.0 to 1.0)
    pub stability: f32,

    /// Voice similarity boost (0.0 to 1.0)
    pub similarity_boost: f32,

    /// Request timeout
    pub timeout: Duration,
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Recognition locale
    pub locale: String,

    /// Transcription model
    pub stt_model: String,

    /// `OpenAI` API key for transcription
    pub openai_api_key: Option<SecretString>,

    /// Submit the round as soon as a final result arrives
    pub auto_submit: bool,
}

/// Audio playback configuration
#[derive(Debug, Clone, Default)]
pub struct PlaybackConfig {
    /// Directory for synthesized audio; a temporary directory when unset
    pub cache_dir: Option<PathBuf>,
}

/// Resolve an endpoint path beneath a base URL
///
/// The base URL's own path is kept: `http://host/api` with `chat` or `/chat`
/// resolves to `http://host/api/chat`.
///
/// # Errors
///
/// Returns error if the joined URL is invalid
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

impl Config {
    /// Load configuration from the environment and the optional config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or fails validation
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path);
        let config = Self::from_sources(fc, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a URL cannot be parsed
    pub fn from_sources(
        fc: file::CosmoConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env_secs = |key: &str| env(key).and_then(|s| s.parse::<u64>().ok());

        let dialogue = DialogueConfig {
            base_url: Url::parse(
                &env("COSMO_DIALOGUE_URL")
                    .or(fc.dialogue.base_url)
                    .unwrap_or_else(|| DEFAULT_DIALOGUE_URL.to_string()),
            )?,
            chat_path: env("COSMO_CHAT_PATH")
                .or(fc.dialogue.chat_path)
                .unwrap_or_else(|| DEFAULT_CHAT_PATH.to_string()),
            timeout: Duration::from_secs(
                env_secs("COSMO_DIALOGUE_TIMEOUT_SECS")
                    .or(fc.dialogue.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        };

        let synthesis = SynthesisConfig {
            api_key: env("ELEVENLABS_API_KEY")
                .or(fc.synthesis.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            base_url: Url::parse(
                &env("ELEVENLABS_BASE_URL")
                    .or(fc.synthesis.base_url)
                    .unwrap_or_else(|| DEFAULT_SYNTHESIS_URL.to_string()),
            )?,
            voice_id: env("ELEVENLABS_VOICE_ID")
                .or(fc.synthesis.voice_id)
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
            model_id: env("COSMO_TTS_MODEL")
                .or(fc.synthesis.model_id)
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            stability: fc.synthesis.stability.unwrap_or(0.5),
            similarity_boost: fc.synthesis.similarity_boost.unwrap_or(0.75),
            timeout: Duration::from_secs(
                env_secs("COSMO_TTS_TIMEOUT_SECS")
                    .or(fc.synthesis.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        };

        let speech = SpeechConfig {
            locale: env("COSMO_LOCALE")
                .or(fc.speech.locale)
                .unwrap_or_else(|| "en-US".to_string()),
            stt_model: env("COSMO_STT_MODEL")
                .or(fc.speech.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            openai_api_key: env("OPENAI_API_KEY")
                .or(fc.speech.openai_api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            auto_submit: env("COSMO_AUTO_SUBMIT")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.speech.auto_submit)
                .unwrap_or(false),
        };

        let playback = PlaybackConfig {
            cache_dir: env("COSMO_CACHE_DIR")
                .or(fc.playback.cache_dir)
                .map(PathBuf::from),
        };

        Ok(Self {
            dialogue,
            synthesis,
            speech,
            playback,
        })
    }

    /// Validate resolved values
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("dialogue.base_url", &self.dialogue.base_url),
            ("synthesis.base_url", &self.synthesis.base_url),
        ] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{name} must be http or https, got {}",
                    url.scheme()
                )));
            }
        }

        if self.dialogue.chat_path.trim_matches('/').is_empty() {
            return Err(Error::Config("dialogue.chat_path must not be empty".to_string()));
        }

        crate::synthesis::validate_voice_id(&self.synthesis.voice_id)?;

        for (name, value) in [
            ("synthesis.stability", self.synthesis.stability),
            ("synthesis.similarity_boost", self.synthesis.similarity_boost),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }

        if self.dialogue.timeout.is_zero() || self.synthesis.timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }

        if self.speech.locale.trim().is_empty() {
            return Err(Error::Config("speech.locale must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(file::CosmoConfigFile::default(), env_from(&[])).unwrap();
        config.validate().unwrap();

        assert_eq!(config.dialogue.base_url.as_str(), "http://localhost:3000/");
        assert_eq!(config.dialogue.chat_path, "/chat");
        assert_eq!(config.synthesis.voice_id, DEFAULT_VOICE_ID);
        assert_eq!(config.synthesis.model_id, "eleven_monolingual_v1");
        assert!(config.synthesis.api_key.is_none());
        assert_eq!(config.speech.locale, "en-US");
        assert!(!config.speech.auto_submit);
        assert_eq!(config.dialogue.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = file::parse_config_file(
            r#"
            [dialogue]
            base_url = "http://file-host:3000"
            timeout_secs = 5

            [synthesis]
            api_key = "from-file"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_from(&[
                ("COSMO_DIALOGUE_URL", "http://env-host:4000"),
                ("ELEVENLABS_API_KEY", "from-env"),
                ("COSMO_AUTO_SUBMIT", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.dialogue.base_url.host_str(), Some("env-host"));
        assert_eq!(config.dialogue.timeout, Duration::from_secs(5));
        assert_eq!(
            config.synthesis.api_key.as_ref().unwrap().expose_secret(),
            "from-env"
        );
        assert!(config.speech.auto_submit);
    }

    #[test]
    fn test_empty_api_key_treated_as_missing() {
        let config = Config::from_sources(
            file::CosmoConfigFile::default(),
            env_from(&[("ELEVENLABS_API_KEY", "")]),
        )
        .unwrap();
        assert!(config.synthesis.api_key.is_none());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = Config::from_sources(
            file::CosmoConfigFile::default(),
            env_from(&[("COSMO_DIALOGUE_URL", "not a url")]),
        );
        assert!(matches!(result, Err(Error::Url(_))));
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let root = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(endpoint_url(&root, "/chat").unwrap().as_str(), "http://localhost:3000/chat");

        let api = Url::parse("http://localhost:3000/api").unwrap();
        assert_eq!(endpoint_url(&api, "/chat").unwrap().as_str(), "http://localhost:3000/api/chat");
        assert_eq!(endpoint_url(&api, "chat").unwrap().as_str(), "http://localhost:3000/api/chat");

        let slash = Url::parse("https://proxy.example.com/eleven/").unwrap();
        assert_eq!(
            endpoint_url(&slash, "v1/text-to-speech/abc/stream").unwrap().as_str(),
            "https://proxy.example.com/eleven/v1/text-to-speech/abc/stream"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config =
            Config::from_sources(file::CosmoConfigFile::default(), env_from(&[])).unwrap();
        config.synthesis.voice_id = "../../etc/passwd".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config =
            Config::from_sources(file::CosmoConfigFile::default(), env_from(&[])).unwrap();
        config.synthesis.stability = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config =
            Config::from_sources(file::CosmoConfigFile::default(), env_from(&[])).unwrap();
        config.dialogue.chat_path = "/".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config::from_sources(
            file::CosmoConfigFile::default(),
            env_from(&[("COSMO_DIALOGUE_URL", "ftp://example.com")]),
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
