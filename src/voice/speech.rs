//! Speech capture controller
//!
//! Wraps a [`RecognitionEngine`] and turns its callbacks into typed
//! [`CaptureEvent`]s. Owns the microphone for the session.

use tokio::sync::mpsc;

use super::recognition::{EngineError, EngineEvent, RecognitionEngine};
use crate::error::RecognitionError;

/// Recognized speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    text: String,
    is_final: bool,
}

impl Transcript {
    /// Create a transcript
    #[must_use]
    pub fn new(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            text: text.into(),
            is_final,
        }
    }

    /// Recognized text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the engine settled on this text
    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.is_final
    }

    /// Whether there is nothing actionable in the text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// What happened during a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEventKind {
    /// Interim recognition result
    Partial(String),
    /// Settled recognition result
    Final(String),
    /// Engine failure mid-capture
    Error(RecognitionError),
}

/// Event from an active capture, tagged with the capture it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Identifier of the capture that produced this event
    pub capture_id: u64,
    /// Event payload
    pub kind: CaptureEventKind,
}

/// Coordinates the recognition engine for one microphone
pub struct SpeechCaptureController {
    engine: Box<dyn RecognitionEngine>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    attached: bool,
    listening: bool,
    capture_id: u64,
    last_final: Option<String>,
}

impl SpeechCaptureController {
    /// Wrap an engine and attach to its events
    #[must_use]
    pub fn new(mut engine: Box<dyn RecognitionEngine>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        engine.subscribe(tx);

        Self {
            engine,
            events: rx,
            attached: true,
            listening: false,
            capture_id: 0,
            last_final: None,
        }
    }

    /// Whether a capture is active
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// Identifier of the most recent capture
    #[must_use]
    pub const fn capture_id(&self) -> u64 {
        self.capture_id
    }

    /// Start a new capture
    ///
    /// An active capture is stopped first. An engine "already started" error
    /// is absorbed by stopping the engine and retrying once.
    ///
    /// # Errors
    ///
    /// Returns `EngineUnavailable` if the engine cannot be used, or the
    /// engine's error if starting fails
    pub async fn start(&mut self, locale: &str) -> Result<(), RecognitionError> {
        if !self.engine.is_available().await {
            tracing::warn!("speech recognition engine unavailable");
            return Err(RecognitionError::EngineUnavailable);
        }

        if self.listening {
            tracing::debug!(capture_id = self.capture_id, "capture already active, restarting");
            if let Err(e) = self.engine.stop().await {
                tracing::debug!(error = %e, "engine stop before restart failed");
            }
            self.listening = false;
        }

        self.discard_pending();
        self.last_final = None;

        match self.engine.start(locale).await {
            Ok(()) => {}
            Err(e) if e.is_already_started() => {
                tracing::warn!(error = %e, "engine already started, stopping and retrying");
                if let Err(stop_err) = self.engine.stop().await {
                    tracing::debug!(error = %stop_err, "engine stop before retry failed");
                }
                self.discard_pending();
                self.engine.start(locale).await.map_err(engine_error)?;
            }
            Err(e) => return Err(engine_error(e)),
        }

        self.capture_id += 1;
        self.listening = true;
        tracing::info!(capture_id = self.capture_id, locale, "listening");
        Ok(())
    }

    /// Stop the active capture and return its last final transcript
    ///
    /// Calling this when not listening returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if stopping fails, or the first engine error
    /// reported during the capture that was not yet delivered as an event
    pub async fn stop(&mut self) -> Result<Option<Transcript>, RecognitionError> {
        if !self.listening {
            return Ok(None);
        }

        let stopped = self.engine.stop().await;

        // Events queued before or during the stop still belong to this capture
        let mut failure = None;
        while let Ok(event) = self.events.try_recv() {
            if let Some(CaptureEventKind::Error(e)) = self.absorb(event) {
                failure.get_or_insert(e);
            }
        }

        self.listening = false;
        stopped.map_err(engine_error)?;

        if let Some(e) = failure {
            self.last_final = None;
            tracing::info!(capture_id = self.capture_id, error = %e, "capture stopped after engine error");
            return Err(e);
        }

        let transcript = self.last_final.take().map(|text| Transcript::new(text, true));
        tracing::info!(
            capture_id = self.capture_id,
            has_transcript = transcript.is_some(),
            "capture stopped"
        );
        Ok(transcript)
    }

    /// Wait for the next event of the active capture
    ///
    /// Events arriving while no capture is active are dropped. Never resolves
    /// once the engine has been detached.
    pub async fn next_event(&mut self) -> CaptureEvent {
        loop {
            match self.events.recv().await {
                Some(event) => {
                    if let Some(kind) = self.absorb(event) {
                        return CaptureEvent {
                            capture_id: self.capture_id,
                            kind,
                        };
                    }
                }
                None => std::future::pending().await,
            }
        }
    }

    /// Force-stop capture and detach from the engine
    pub async fn teardown(&mut self) {
        if let Err(e) = self.engine.stop().await {
            tracing::debug!(error = %e, "engine stop during teardown failed");
        }
        self.listening = false;
        self.last_final = None;
        if self.attached {
            self.engine.unsubscribe();
            self.attached = false;
        }
        tracing::debug!("speech capture torn down");
    }

    fn absorb(&mut self, event: EngineEvent) -> Option<CaptureEventKind> {
        if !self.listening {
            tracing::debug!(?event, "dropping engine event outside an active capture");
            return None;
        }

        match event {
            EngineEvent::Result { text, is_final: true } => {
                self.last_final = Some(text.clone());
                Some(CaptureEventKind::Final(text))
            }
            EngineEvent::Result { text, is_final: false } => Some(CaptureEventKind::Partial(text)),
            EngineEvent::Error { code, message } => {
                let err = EngineError { code, message };
                if err.is_already_started() {
                    tracing::warn!(error = %err, "ignoring engine already-started report");
                    return None;
                }
                tracing::warn!(error = %err, "speech recognition error");
                Some(CaptureEventKind::Error(engine_error(err)))
            }
        }
    }

    fn discard_pending(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            tracing::trace!(?event, "discarding stale engine event");
        }
    }
}

impl Drop for SpeechCaptureController {
    fn drop(&mut self) {
        if self.attached {
            self.engine.unsubscribe();
        }
    }
}

fn engine_error(err: EngineError) -> RecognitionError {
    RecognitionError::Engine {
        code: err.code,
        message: err.message,
    }
}
