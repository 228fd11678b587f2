//! Microphone recognition engine backed by a transcription API
//!
//! Records while listening; on stop the recording is encoded as WAV and
//! transcribed, and the transcript is published as a single final result.

use async_trait::async_trait;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::recognition::{EngineError, EngineEvent, EngineEventSender, RecognitionEngine};
use super::stt::SpeechToText;

/// Recordings shorter than this are treated as silence (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 3 / 10;

/// Recognition engine that records with `cpal` and transcribes on stop
pub struct WhisperRecognizer {
    stt: SpeechToText,
    capture: Option<AudioCapture>,
    events: Option<EngineEventSender>,
    locale: String,
}

impl WhisperRecognizer {
    /// Create a recognizer; the microphone is opened on first start
    #[must_use]
    pub fn new(stt: SpeechToText) -> Self {
        Self {
            stt,
            capture: None,
            events: None,
            locale: String::new(),
        }
    }

    fn is_active(&self) -> bool {
        self.capture.as_ref().is_some_and(AudioCapture::is_capturing)
    }

    fn publish(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                tracing::debug!("recognition listener gone");
            }
        }
    }
}

#[async_trait(?Send)]
impl RecognitionEngine for WhisperRecognizer {
    async fn is_available(&self) -> bool {
        AudioCapture::is_input_available()
    }

    async fn start(&mut self, locale: &str) -> Result<(), EngineError> {
        if self.is_active() {
            return Err(EngineError::already_started());
        }

        if self.capture.is_none() {
            let capture = AudioCapture::new().map_err(|e| EngineError::new("audio", e.to_string()))?;
            self.capture = Some(capture);
        }

        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| EngineError::new("audio", "capture not initialized"))?;
        capture.clear_buffer();
        capture
            .start()
            .map_err(|e| EngineError::new("audio", e.to_string()))?;

        self.locale = locale.to_string();
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        if !self.is_active() {
            return Ok(());
        }

        let samples = match self.capture.as_mut() {
            Some(capture) => {
                capture.stop();
                capture
                    .take_buffer()
                    .map_err(|e| EngineError::new("audio", e.to_string()))?
            }
            None => return Ok(()),
        };

        if samples.len() < MIN_SPEECH_SAMPLES {
            tracing::debug!(samples = samples.len(), "recording too short, skipping transcription");
            return Ok(());
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE)
            .map_err(|e| EngineError::new("audio", e.to_string()))?;

        let text = self
            .stt
            .transcribe(&wav, &self.locale)
            .await
            .map_err(|e| EngineError::new("transcription", e.to_string()))?;

        self.publish(EngineEvent::Result {
            text,
            is_final: true,
        });
        Ok(())
    }

    fn subscribe(&mut self, events: EngineEventSender) {
        self.events = Some(events);
    }

    fn unsubscribe(&mut self) {
        self.events = None;
    }
}
