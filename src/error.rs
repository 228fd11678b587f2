//! Error types for Cosmo voice
//!
//! [`Error`] covers setup and infrastructure failures. The per-stage errors
//! ([`RecognitionError`], [`DialogueError`], [`SynthesisError`],
//! [`PlaybackError`]) are returned by the session's collaborators and folded
//! into a single [`FailureReason`] by the session.

use thiserror::Error;

/// Result type alias for Cosmo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running Cosmo
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing error
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Failures from the speech recognition stage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// The engine could not be probed or initialized
    #[error("speech recognition engine unavailable")]
    EngineUnavailable,

    /// The engine reported a failure while starting, stopping or capturing
    #[error("speech recognition error ({code}): {message}")]
    Engine {
        /// Engine-specific error code
        code: String,
        /// Engine-supplied description
        message: String,
    },
}

/// Failures from the dialogue endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueError {
    /// Transport or connection failure (including timeouts)
    #[error("dialogue network error: {0}")]
    Network(String),

    /// Non-success status or a body that could not be parsed
    #[error("dialogue bad response: {0}")]
    BadResponse(String),

    /// Success status but no usable reply text
    #[error("dialogue returned an empty reply")]
    EmptyReply,

    /// The message to send was blank, so no request was made
    #[error("dialogue message is blank")]
    BlankMessage,
}

/// Failures from the speech synthesis provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// Provider rejected the credentials (401)
    #[error("synthesis unauthorized")]
    Unauthorized,

    /// Configured voice does not exist (404)
    #[error("synthesis voice not found")]
    VoiceNotFound,

    /// Provider rejected the text (422)
    #[error("synthesis input rejected")]
    InvalidInput,

    /// Provider rate limit hit (429)
    #[error("synthesis rate limited")]
    RateLimited,

    /// Any other non-success status
    #[error("synthesis provider error (status {0})")]
    ProviderError(u16),

    /// Transport or connection failure (including timeouts)
    #[error("synthesis network error: {0}")]
    Network(String),

    /// Success status but the payload was not audio
    #[error("synthesis returned non-audio content: {0}")]
    UnexpectedContent(String),

    /// The audio payload could not be stored locally
    #[error("failed to store synthesized audio: {0}")]
    Storage(String),
}

impl SynthesisError {
    /// Map a non-success HTTP status to its synthesis error
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::VoiceNotFound,
            422 => Self::InvalidInput,
            429 => Self::RateLimited,
            other => Self::ProviderError(other),
        }
    }
}

/// Failures from the audio output device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The device could not be configured for playback
    #[error("failed to configure audio output: {0}")]
    Configure(String),

    /// The asset could not be loaded
    #[error("failed to load audio: {0}")]
    Load(String),

    /// Playback started but failed
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Why a session entered the failed state
///
/// One variant per external failure domain. The presentation layer shows
/// [`FailureReason::user_message`] and offers a single retry action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The recognition engine could not be probed or started
    #[error("recognition unavailable")]
    RecognitionUnavailable,

    /// The recognition engine failed mid-capture
    #[error("recognition failed: {0}")]
    Recognition(String),

    /// The dialogue request failed
    #[error(transparent)]
    Dialogue(DialogueError),

    /// The synthesis request failed
    #[error(transparent)]
    Synthesis(SynthesisError),

    /// The output device failed to load or play
    #[error(transparent)]
    Playback(PlaybackError),
}

impl FailureReason {
    /// Human-readable message for the presentation layer
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RecognitionUnavailable => {
                "Voice recognition is not available on this device.".to_string()
            }
            Self::Recognition(_) => "Failed to recognize speech. Please try again.".to_string(),
            Self::Dialogue(_) => {
                "Dude, I'm having trouble connecting to the cosmic consciousness right now..."
                    .to_string()
            }
            Self::Synthesis(e) => match e {
                SynthesisError::Unauthorized => {
                    "Invalid API key. Please check your ElevenLabs API key.".to_string()
                }
                SynthesisError::VoiceNotFound => {
                    "Voice ID not found. Please check your ElevenLabs Voice ID.".to_string()
                }
                SynthesisError::InvalidInput => {
                    "Invalid text input. Please try again with different text.".to_string()
                }
                SynthesisError::RateLimited => {
                    "Rate limit exceeded. Please try again later.".to_string()
                }
                SynthesisError::ProviderError(code) => {
                    format!("Speech provider error ({code}). Please try again.")
                }
                SynthesisError::Network(_)
                | SynthesisError::UnexpectedContent(_)
                | SynthesisError::Storage(_) => {
                    "Failed to generate speech. Please try again.".to_string()
                }
            },
            Self::Playback(_) => "Error playing audio. Please try again.".to_string(),
        }
    }
}

impl From<RecognitionError> for FailureReason {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::EngineUnavailable => Self::RecognitionUnavailable,
            RecognitionError::Engine { .. } => Self::Recognition(err.to_string()),
        }
    }
}

impl From<DialogueError> for FailureReason {
    fn from(err: DialogueError) -> Self {
        Self::Dialogue(err)
    }
}

impl From<SynthesisError> for FailureReason {
    fn from(err: SynthesisError) -> Self {
        Self::Synthesis(err)
    }
}

impl From<PlaybackError> for FailureReason {
    fn from(err: PlaybackError) -> Self {
        Self::Playback(err)
    }
}
