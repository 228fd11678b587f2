//! Playback controller
//!
//! Owns the output device for the session. At most one asset is loaded at a
//! time: every load is preceded by unloading and releasing the previous one.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::assets::{AudioAsset, AudioAssetStore};
use super::output::{DeviceHandle, OutputDevice, OutputMode, PlaybackStatus};
use crate::error::PlaybackError;

/// Outcome of playing the loaded asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The asset played to the end
    Finished,
    /// The asset failed to play
    Failed(PlaybackError),
}

struct Loaded {
    asset: AudioAsset,
    handle: DeviceHandle,
}

/// Plays one asset at a time on the output device
pub struct PlaybackController {
    device: Box<dyn OutputDevice>,
    store: Arc<AudioAssetStore>,
    statuses: mpsc::UnboundedReceiver<PlaybackStatus>,
    mode: OutputMode,
    configured: bool,
    loaded: Option<Loaded>,
}

impl PlaybackController {
    /// Take ownership of an output device
    #[must_use]
    pub fn new(mut device: Box<dyn OutputDevice>, store: Arc<AudioAssetStore>, mode: OutputMode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        device.subscribe(tx);

        Self {
            device,
            store,
            statuses: rx,
            mode,
            configured: false,
            loaded: None,
        }
    }

    /// Whether an asset is currently loaded
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.loaded.is_some()
    }

    /// Locator of the loaded asset
    #[must_use]
    pub fn loaded_locator(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.asset.locator())
    }

    /// Start playing an asset, releasing whatever was loaded before
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be configured or the asset cannot
    /// be loaded; the asset is released in that case
    pub fn play(&mut self, asset: AudioAsset) -> Result<(), PlaybackError> {
        self.unload_current();

        if !self.configured {
            if let Err(e) = self.device.configure(self.mode) {
                tracing::error!(error = %e, "failed to configure audio output");
                self.store.release(&asset);
                return Err(e);
            }
            self.configured = true;
        }

        match self.device.load(asset.locator()) {
            Ok(handle) => {
                tracing::info!(handle = handle.0, locator = asset.locator(), "playback started");
                self.loaded = Some(Loaded { asset, handle });
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, locator = asset.locator(), "failed to load audio");
                self.store.release(&asset);
                Err(e)
            }
        }
    }

    /// Stop playback and release the loaded asset
    ///
    /// Statuses still in flight for the released asset are ignored.
    pub fn stop(&mut self) {
        if self.unload_current() {
            tracing::debug!("playback stopped");
        }
    }

    /// Release an asset that will never be played
    pub fn discard(&self, asset: AudioAsset) {
        self.store.release(&asset);
    }

    /// Translate a device status into an event for the loaded asset
    ///
    /// Finishing or failing releases the asset, so each asset yields at most
    /// one event.
    pub fn handle_status(&mut self, status: PlaybackStatus) -> Option<PlaybackEvent> {
        let current = self.loaded.as_ref()?.handle;
        if status.handle != current {
            tracing::trace!(handle = status.handle.0, "ignoring status for released asset");
            return None;
        }

        if let Some(error) = status.error {
            tracing::warn!(handle = current.0, error = %error, "playback error");
            self.unload_current();
            return Some(PlaybackEvent::Failed(PlaybackError::Playback(error)));
        }

        if status.is_loaded && status.did_just_finish {
            tracing::info!(handle = current.0, "playback finished");
            self.unload_current();
            return Some(PlaybackEvent::Finished);
        }

        None
    }

    /// Wait for the next event of the loaded asset
    pub async fn next_event(&mut self) -> PlaybackEvent {
        loop {
            match self.statuses.recv().await {
                Some(status) => {
                    if let Some(event) = self.handle_status(status) {
                        return event;
                    }
                }
                None => std::future::pending().await,
            }
        }
    }

    fn unload_current(&mut self) -> bool {
        match self.loaded.take() {
            Some(loaded) => {
                self.device.unload(loaded.handle);
                self.store.release(&loaded.asset);
                true
            }
            None => false,
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.unload_current();
    }
}
