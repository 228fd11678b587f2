//! Voice processing module
//!
//! Speech capture, audio assets, and playback. The dialogue and synthesis
//! clients live in their own modules; the session in `session.rs` drives
//! all of them.

mod assets;
mod capture;
mod output;
mod playback;
mod recognition;
mod resample;
mod speech;
mod stt;
mod whisper;

pub use assets::{AudioAsset, AudioAssetStore};
pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use output::{
    DeviceHandle, OutputDevice, OutputMode, PlaybackStatus, PlaybackStatusSender, SpeakerOutput,
};
pub use playback::{PlaybackController, PlaybackEvent};
pub use recognition::{
    ALREADY_STARTED, EngineError, EngineEvent, EngineEventSender, RecognitionEngine,
};
pub use speech::{CaptureEvent, CaptureEventKind, SpeechCaptureController, Transcript};
pub use stt::SpeechToText;
pub use whisper::WhisperRecognizer;
