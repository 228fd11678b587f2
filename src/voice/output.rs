//! Audio output device capability and the speaker implementation

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;

use super::resample::{downmix, resample};
use crate::error::PlaybackError;
use crate::{Error, Result};

/// Handle to an asset loaded in an output device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// How the output device behaves relative to the rest of the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    /// Play even when the device is silenced
    pub plays_in_silent_mode: bool,
    /// Keep playing when the app is backgrounded
    pub stays_active_in_background: bool,
    /// Lower other audio while playing
    pub ducks_others: bool,
}

impl Default for OutputMode {
    fn default() -> Self {
        Self {
            plays_in_silent_mode: true,
            stays_active_in_background: true,
            ducks_others: true,
        }
    }
}

/// Status update for a loaded asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStatus {
    /// Asset the status refers to
    pub handle: DeviceHandle,
    /// Whether the asset is still loaded
    pub is_loaded: bool,
    /// Whether playback just reached the end
    pub did_just_finish: bool,
    /// Playback failure, if any
    pub error: Option<String>,
}

/// Channel an output device publishes statuses on
pub type PlaybackStatusSender = mpsc::UnboundedSender<PlaybackStatus>;

/// A device that plays loaded assets
pub trait OutputDevice {
    /// Configure output behavior
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the mode
    fn configure(&mut self, mode: OutputMode) -> std::result::Result<(), PlaybackError>;

    /// Load an asset and start playing it
    ///
    /// # Errors
    ///
    /// Returns error if the asset cannot be loaded
    fn load(&mut self, locator: &str) -> std::result::Result<DeviceHandle, PlaybackError>;

    /// Stop and unload an asset
    fn unload(&mut self, handle: DeviceHandle);

    /// Attach the listener that receives playback statuses
    fn subscribe(&mut self, statuses: PlaybackStatusSender);
}

/// Plays MP3 assets through the default output device
///
/// Each load decodes the file and plays it on a dedicated thread, since
/// `cpal` streams cannot move between threads.
pub struct SpeakerOutput {
    next_handle: u64,
    playing: HashMap<DeviceHandle, Arc<AtomicBool>>,
    statuses: Option<PlaybackStatusSender>,
    mode: Option<OutputMode>,
}

impl SpeakerOutput {
    /// Create a speaker output
    ///
    /// # Errors
    ///
    /// Returns error if there is no output device
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(device = %device.name().unwrap_or_default(), "audio output initialized");

        Ok(Self {
            next_handle: 0,
            playing: HashMap::new(),
            statuses: None,
            mode: None,
        })
    }
}

impl OutputDevice for SpeakerOutput {
    fn configure(&mut self, mode: OutputMode) -> std::result::Result<(), PlaybackError> {
        // cpal has no session categories; the mode is recorded for diagnostics
        tracing::debug!(?mode, "audio output configured");
        self.mode = Some(mode);
        Ok(())
    }

    fn load(&mut self, locator: &str) -> std::result::Result<DeviceHandle, PlaybackError> {
        let bytes = std::fs::read(locator).map_err(|e| PlaybackError::Load(e.to_string()))?;
        let (samples, sample_rate) =
            decode_mp3(&bytes).map_err(|e| PlaybackError::Load(e.to_string()))?;

        self.next_handle += 1;
        let handle = DeviceHandle(self.next_handle);
        let stop = Arc::new(AtomicBool::new(false));
        self.playing.insert(handle, Arc::clone(&stop));

        let statuses = self.statuses.clone();
        std::thread::Builder::new()
            .name("cosmo-playback".to_string())
            .spawn(move || {
                let result = play_blocking(&samples, sample_rate, &stop);
                if stop.load(Ordering::Acquire) {
                    return;
                }
                let status = match result {
                    Ok(()) => PlaybackStatus {
                        handle,
                        is_loaded: true,
                        did_just_finish: true,
                        error: None,
                    },
                    Err(e) => PlaybackStatus {
                        handle,
                        is_loaded: true,
                        did_just_finish: false,
                        error: Some(e.to_string()),
                    },
                };
                if let Some(statuses) = statuses {
                    let _ = statuses.send(status);
                }
            })
            .map_err(|e| PlaybackError::Load(e.to_string()))?;

        tracing::debug!(handle = handle.0, locator, mode = ?self.mode, "audio loaded");
        Ok(handle)
    }

    fn unload(&mut self, handle: DeviceHandle) {
        if let Some(stop) = self.playing.remove(&handle) {
            stop.store(true, Ordering::Release);
            tracing::debug!(handle = handle.0, "audio unloaded");
        }
    }

    fn subscribe(&mut self, statuses: PlaybackStatusSender) {
        self.statuses = Some(statuses);
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        for stop in self.playing.values() {
            stop.store(true, Ordering::Release);
        }
    }
}

/// Play mono samples until they run out or `stop` is set
fn play_blocking(samples: &[f32], sample_rate: u32, stop: &AtomicBool) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;
    let config = device
        .default_output_config()
        .map_err(|e| Error::Audio(e.to_string()))?
        .config();

    let device_rate = config.sample_rate.0;
    let channels = usize::from(config.channels);
    let samples: Arc<Vec<f32>> = Arc::new(resample(samples, sample_rate, device_rate)?);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.load(Ordering::Relaxed);
                        let sample = samples.get(pos).copied().unwrap_or_else(|| {
                            finished.store(true, Ordering::Release);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < samples.len() {
                            position.store(pos + 1, Ordering::Relaxed);
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (samples.len() as u64 * 1000) / u64::from(device_rate);
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();

    while !finished.load(Ordering::Acquire) && !stop.load(Ordering::Acquire) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate)
                    .map_err(|_| Error::Audio("invalid MP3 sample rate".to_string()))?;
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&pcm, frame.channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => {}
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("no MP3 frames found".to_string()));
    }

    Ok((samples, sample_rate))
}
