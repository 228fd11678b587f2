//! Speech recognition engine capability
//!
//! An engine is started and stopped by the capture controller and reports
//! transcripts and errors asynchronously through a subscribed channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Engine error code for a start request while already listening
pub const ALREADY_STARTED: &str = "already_started";

/// Event delivered by a recognition engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A transcript, partial or final
    Result {
        /// Recognized text
        text: String,
        /// Whether the engine considers this result settled
        is_final: bool,
    },
    /// A failure reported outside a start/stop call
    Error {
        /// Engine-specific error code
        code: String,
        /// Engine-supplied description
        message: String,
    },
}

/// Channel an engine publishes its events on
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Error returned by an engine's start or stop request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct EngineError {
    /// Engine-specific error code
    pub code: String,
    /// Engine-supplied description
    pub message: String,
}

impl EngineError {
    /// Create an engine error
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The error engines report when started twice
    #[must_use]
    pub fn already_started() -> Self {
        Self::new(ALREADY_STARTED, "Speech recognition already started!")
    }

    /// Whether this is the recoverable "already started" condition
    #[must_use]
    pub fn is_already_started(&self) -> bool {
        self.code == ALREADY_STARTED
            || self.message.to_lowercase().contains("already started")
    }
}

/// A speech recognition engine
///
/// Futures are not required to be `Send`: audio device handles are commonly
/// tied to the thread that opened them.
#[async_trait(?Send)]
pub trait RecognitionEngine {
    /// Probe whether the engine can be used on this device
    async fn is_available(&self) -> bool;

    /// Begin listening
    async fn start(&mut self, locale: &str) -> Result<(), EngineError>;

    /// Stop listening
    ///
    /// Engines that only settle a transcript once capture ends should publish
    /// the final result before returning.
    async fn stop(&mut self) -> Result<(), EngineError>;

    /// Attach the listener that receives engine events
    fn subscribe(&mut self, events: EngineEventSender);

    /// Detach the current listener
    fn unsubscribe(&mut self);
}
