//! Local storage for synthesized audio
//!
//! Every synthesis response is written to its own file so a stale locator can
//! never alias a fresh one. Releasing is best-effort.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use crate::{Error, Result};

/// A locally playable handle to synthesized audio
///
/// Not `Clone`: an asset has exactly one owner at a time, first the store's
/// caller, then the playback controller while it is loaded.
#[derive(Debug, PartialEq, Eq)]
pub struct AudioAsset {
    locator: String,
    created_at: DateTime<Utc>,
}

impl AudioAsset {
    /// Wrap an existing playable resource
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            created_at: Utc::now(),
        }
    }

    /// Opaque playable-resource handle (a file path for stored assets)
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// When the asset was materialized
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Owns the on-disk lifetime of synthesized audio
#[derive(Debug)]
pub struct AudioAssetStore {
    dir: PathBuf,
    // Keeps a private directory alive; removed with the store
    _temp: Option<TempDir>,
}

impl AudioAssetStore {
    /// Create a store in `cache_dir`, or in a private temporary directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(cache_dir: Option<&Path>) -> Result<Self> {
        match cache_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                tracing::debug!(dir = %dir.display(), "audio asset store ready");
                Ok(Self {
                    dir: dir.to_path_buf(),
                    _temp: None,
                })
            }
            None => Self::temporary(),
        }
    }

    /// Create a store backed by a temporary directory
    ///
    /// # Errors
    ///
    /// Returns error if the temporary directory cannot be created
    pub fn temporary() -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("cosmo-audio-")
            .tempdir()
            .map_err(Error::Io)?;
        tracing::debug!(dir = %temp.path().display(), "audio asset store ready (temporary)");
        Ok(Self {
            dir: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    /// Directory holding materialized assets
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an audio payload and return a fresh asset for it
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn materialize(&self, audio: &[u8]) -> std::io::Result<AudioAsset> {
        let created_at = Utc::now();
        let name = format!(
            "reply-{}-{}.mp3",
            created_at.timestamp_millis(),
            Uuid::new_v4().simple()
        );
        let path = self.dir.join(name);

        tokio::fs::write(&path, audio).await?;
        tracing::debug!(path = %path.display(), bytes = audio.len(), "audio asset materialized");

        Ok(AudioAsset {
            locator: path.to_string_lossy().into_owned(),
            created_at,
        })
    }

    /// Remove the asset's backing file
    ///
    /// Failures are logged and otherwise ignored.
    pub fn release(&self, asset: &AudioAsset) {
        match std::fs::remove_file(&asset.locator) {
            Ok(()) => tracing::debug!(locator = %asset.locator, "audio asset released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!(locator = %asset.locator, "audio asset already gone");
            }
            Err(e) => {
                tracing::warn!(locator = %asset.locator, error = %e, "failed to release audio asset");
            }
        }
    }
}
