//! Cosmo Voice - hands-free voice conversation with a dialogue service
//!
//! This library provides the pieces of a push-to-talk voice session:
//! - Speech capture over a pluggable recognition engine
//! - A dialogue client for the chat endpoint
//! - Speech synthesis via ElevenLabs
//! - Single-slot audio playback with temporary asset cleanup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Presentation (CLI)                   │
//! │        intents ──▶          ◀── snapshots            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Voice Session                       │
//! │  Idle → Listening → AwaitingReply → Synthesizing     │
//! │        → Speaking → Idle        (or Failed)          │
//! └───┬──────────────┬───────────────┬──────────────┬───┘
//!     │              │               │              │
//! ┌───▼─────┐  ┌─────▼─────┐  ┌──────▼──────┐  ┌────▼─────┐
//! │ Capture │  │ Dialogue  │  │  Synthesis  │  │ Playback │
//! └─────────┘  └───────────┘  └─────────────┘  └──────────┘
//! ```

pub mod config;
pub mod dialogue;
pub mod error;
pub mod session;
pub mod synthesis;
pub mod voice;

pub use config::Config;
pub use dialogue::{DialogueClient, DialogueService};
pub use error::{
    DialogueError, Error, FailureReason, PlaybackError, RecognitionError, Result, SynthesisError,
};
pub use session::{
    DialogueTurn, RoundToken, SessionEvent, SessionOptions, SessionSnapshot, SessionState,
    UserIntent, VoiceSession,
};
pub use synthesis::{SpeechSynthesizer, SynthesisClient};
