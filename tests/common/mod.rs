//! Shared test utilities
//!
//! Fakes for every session collaborator, so the voice pipeline can be
//! exercised without audio hardware or network access.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use cosmo_voice::voice::{
    AudioAsset, AudioAssetStore, DeviceHandle, EngineError, EngineEvent, EngineEventSender,
    OutputDevice, OutputMode, PlaybackController, PlaybackStatus, PlaybackStatusSender,
    RecognitionEngine, SpeechCaptureController,
};
use cosmo_voice::{
    DialogueError, DialogueService, PlaybackError, SessionOptions, SpeechSynthesizer,
    SynthesisError, VoiceSession,
};

pub const QUESTION: &str = "what is time";
pub const ANSWER: &str =
    "Whoa, time is just the universe's way of keeping everything from happening at once.";

// Recognition engine

#[derive(Default)]
struct EngineState {
    available: bool,
    active: bool,
    starts: usize,
    stops: usize,
    start_failures: VecDeque<EngineError>,
    final_on_stop: Option<String>,
    sender: Option<EngineEventSender>,
    unsubscribes: usize,
}

/// Scriptable recognition engine
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

/// Test-side view of a [`FakeEngine`]
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn new() -> (Self, EngineHandle) {
        let state = Arc::new(Mutex::new(EngineState {
            available: true,
            ..EngineState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            EngineHandle { state },
        )
    }
}

#[async_trait(?Send)]
impl RecognitionEngine for FakeEngine {
    async fn is_available(&self) -> bool {
        self.state.lock().unwrap().available
    }

    async fn start(&mut self, _locale: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.start_failures.pop_front() {
            return Err(err);
        }
        if state.active {
            return Err(EngineError::already_started());
        }
        state.starts += 1;
        state.active = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.stops += 1;
        if state.active {
            state.active = false;
            if let Some(text) = state.final_on_stop.take() {
                if let Some(sender) = &state.sender {
                    let _ = sender.send(EngineEvent::Result { text, is_final: true });
                }
            }
        }
        Ok(())
    }

    fn subscribe(&mut self, events: EngineEventSender) {
        self.state.lock().unwrap().sender = Some(events);
    }

    fn unsubscribe(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.sender = None;
        state.unsubscribes += 1;
    }
}

impl EngineHandle {
    fn emit(&self, event: EngineEvent) {
        if let Some(sender) = &self.state.lock().unwrap().sender {
            let _ = sender.send(event);
        }
    }

    pub fn partial(&self, text: &str) {
        self.emit(EngineEvent::Result {
            text: text.to_string(),
            is_final: false,
        });
    }

    pub fn final_result(&self, text: &str) {
        self.emit(EngineEvent::Result {
            text: text.to_string(),
            is_final: true,
        });
    }

    pub fn error(&self, code: &str, message: &str) {
        self.emit(EngineEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    /// Publish `text` as the final result when the engine is next stopped
    pub fn final_on_stop(&self, text: &str) {
        self.state.lock().unwrap().final_on_stop = Some(text.to_string());
    }

    /// Make the next start fail with `err`
    pub fn fail_next_start(&self, err: EngineError) {
        self.state.lock().unwrap().start_failures.push_back(err);
    }

    /// Pretend the engine was left running by someone else
    pub fn force_active(&self) {
        self.state.lock().unwrap().active = true;
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unwrap().available = available;
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().unwrap().sender.is_some()
    }

    pub fn unsubscribes(&self) -> usize {
        self.state.lock().unwrap().unsubscribes
    }
}

// Output device

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    Configure(OutputMode),
    Load(String),
    Unload(DeviceHandle),
}

#[derive(Default)]
struct OutputState {
    ops: Vec<DeviceOp>,
    loaded: Vec<DeviceHandle>,
    max_loaded: usize,
    next_handle: u64,
    statuses: Option<PlaybackStatusSender>,
    fail_next_load: Option<String>,
    fail_configure: Option<String>,
}

/// Output device that records every call
pub struct FakeOutput {
    state: Arc<Mutex<OutputState>>,
}

/// Test-side view of a [`FakeOutput`]
#[derive(Clone)]
pub struct OutputHandle {
    state: Arc<Mutex<OutputState>>,
}

impl FakeOutput {
    pub fn new() -> (Self, OutputHandle) {
        let state = Arc::new(Mutex::new(OutputState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            OutputHandle { state },
        )
    }
}

impl OutputDevice for FakeOutput {
    fn configure(&mut self, mode: OutputMode) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(DeviceOp::Configure(mode));
        match state.fail_configure.take() {
            Some(message) => Err(PlaybackError::Configure(message)),
            None => Ok(()),
        }
    }

    fn load(&mut self, locator: &str) -> Result<DeviceHandle, PlaybackError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(DeviceOp::Load(locator.to_string()));
        if let Some(message) = state.fail_next_load.take() {
            return Err(PlaybackError::Load(message));
        }
        state.next_handle += 1;
        let handle = DeviceHandle(state.next_handle);
        state.loaded.push(handle);
        state.max_loaded = state.max_loaded.max(state.loaded.len());
        Ok(handle)
    }

    fn unload(&mut self, handle: DeviceHandle) {
        let mut state = self.state.lock().unwrap();
        state.ops.push(DeviceOp::Unload(handle));
        state.loaded.retain(|h| *h != handle);
    }

    fn subscribe(&mut self, statuses: PlaybackStatusSender) {
        self.state.lock().unwrap().statuses = Some(statuses);
    }
}

impl OutputHandle {
    pub fn send(&self, status: PlaybackStatus) {
        if let Some(sender) = &self.state.lock().unwrap().statuses {
            let _ = sender.send(status);
        }
    }

    /// Report that the most recently loaded asset played to the end
    pub fn finish(&self, handle: DeviceHandle) {
        self.send(PlaybackStatus {
            handle,
            is_loaded: true,
            did_just_finish: true,
            error: None,
        });
    }

    /// Report a playback failure
    pub fn fail(&self, handle: DeviceHandle, message: &str) {
        self.send(PlaybackStatus {
            handle,
            is_loaded: false,
            did_just_finish: false,
            error: Some(message.to_string()),
        });
    }

    /// Report a progress update that is neither a finish nor an error
    pub fn progress(&self, handle: DeviceHandle) {
        self.send(PlaybackStatus {
            handle,
            is_loaded: true,
            did_just_finish: false,
            error: None,
        });
    }

    pub fn fail_next_load(&self, message: &str) {
        self.state.lock().unwrap().fail_next_load = Some(message.to_string());
    }

    pub fn fail_configure(&self, message: &str) {
        self.state.lock().unwrap().fail_configure = Some(message.to_string());
    }

    pub fn ops(&self) -> Vec<DeviceOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn last_handle(&self) -> DeviceHandle {
        DeviceHandle(self.state.lock().unwrap().next_handle)
    }

    pub fn loaded(&self) -> Vec<DeviceHandle> {
        self.state.lock().unwrap().loaded.clone()
    }

    pub fn max_loaded(&self) -> usize {
        self.state.lock().unwrap().max_loaded
    }

    pub fn count(&self, pred: impl Fn(&DeviceOp) -> bool) -> usize {
        self.state.lock().unwrap().ops.iter().filter(|op| pred(op)).count()
    }
}

// Remote services

/// Dialogue service with scripted replies
#[derive(Default)]
pub struct FakeDialogue {
    replies: Mutex<VecDeque<Result<String, DialogueError>>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeDialogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every request until the gate gets a permit
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn reply(&self, result: Result<String, DialogueError>) {
        self.replies.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialogueService for FakeDialogue {
    async fn request_reply(&self, text: &str) -> Result<String, DialogueError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ANSWER.to_string()))
    }
}

/// Synthesizer that writes real files through the store
pub struct FakeSynth {
    store: Arc<AudioAssetStore>,
    failures: Mutex<VecDeque<Option<SynthesisError>>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSynth {
    pub fn new(store: Arc<AudioAssetStore>) -> Self {
        Self {
            store,
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(store: Arc<AudioAssetStore>, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(store)
        }
    }

    /// Make the next request fail with `err`
    pub fn fail_next(&self, err: SynthesisError) {
        self.failures.lock().unwrap().push_back(Some(err));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<AudioAsset, SynthesisError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(Some(err)) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.store
            .materialize(b"ID3fake-mp3-payload")
            .await
            .map_err(|e| SynthesisError::Storage(e.to_string()))
    }
}

// Session harness

pub struct Harness {
    pub session: VoiceSession,
    pub engine: EngineHandle,
    pub output: OutputHandle,
    pub dialogue: Arc<FakeDialogue>,
    pub synth: Arc<FakeSynth>,
    pub store: Arc<AudioAssetStore>,
}

pub struct HarnessBuilder {
    options: SessionOptions,
    dialogue_gate: Option<Arc<Semaphore>>,
    synth_gate: Option<Arc<Semaphore>>,
}

impl HarnessBuilder {
    pub fn auto_submit(mut self) -> Self {
        self.options.auto_submit = true;
        self
    }

    pub fn dialogue_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.dialogue_gate = Some(gate);
        self
    }

    pub fn synth_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.synth_gate = Some(gate);
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(AudioAssetStore::temporary().expect("failed to create asset store"));
        let (engine, engine_handle) = FakeEngine::new();
        let (output, output_handle) = FakeOutput::new();

        let dialogue = Arc::new(match self.dialogue_gate {
            Some(gate) => FakeDialogue::gated(gate),
            None => FakeDialogue::new(),
        });
        let synth = Arc::new(match self.synth_gate {
            Some(gate) => FakeSynth::gated(Arc::clone(&store), gate),
            None => FakeSynth::new(Arc::clone(&store)),
        });

        let session = VoiceSession::new(
            SpeechCaptureController::new(Box::new(engine)),
            PlaybackController::new(Box::new(output), Arc::clone(&store), OutputMode::default()),
            Arc::clone(&dialogue) as Arc<dyn DialogueService>,
            Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
            self.options,
        );

        Harness {
            session,
            engine: engine_handle,
            output: output_handle,
            dialogue,
            synth,
            store,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder {
        options: SessionOptions::default(),
        dialogue_gate: None,
        synth_gate: None,
    }
}

impl Harness {
    /// Process exactly one session event
    pub async fn step(&mut self) {
        tokio::time::timeout(Duration::from_secs(2), self.session.process_next())
            .await
            .expect("timed out waiting for a session event");
    }

    /// Number of asset files currently on disk
    pub fn asset_files(&self) -> usize {
        count_files(self.store.dir())
    }
}

pub fn count_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
