//! TOML configuration file loading
//!
//! Supports `~/.config/cosmo/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CosmoConfigFile {
    /// Dialogue endpoint configuration
    #[serde(default)]
    pub dialogue: DialogueFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub synthesis: SynthesisFileConfig,

    /// Speech recognition configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Audio playback configuration
    #[serde(default)]
    pub playback: PlaybackFileConfig,
}

/// Dialogue endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct DialogueFileConfig {
    /// Base URL of the dialogue server (e.g. "http://localhost:3000")
    pub base_url: Option<String>,

    /// Chat path relative to the base URL (e.g. "/chat")
    pub chat_path: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct SynthesisFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,
    pub timeout_secs: Option<u64>,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Recognition locale (e.g. "en-US")
    pub locale: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// `OpenAI` API key for transcription
    pub openai_api_key: Option<String>,

    /// Submit automatically when the engine delivers a final result
    pub auto_submit: Option<bool>,
}

/// Audio playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackFileConfig {
    /// Directory for synthesized audio files
    pub cache_dir: Option<String>,
}

/// Load the TOML config file from `path`, or from the standard path
///
/// Returns `CosmoConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> CosmoConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return CosmoConfigFile::default();
    };

    if !path.exists() {
        return CosmoConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CosmoConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CosmoConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the content is not valid TOML for the schema
pub fn parse_config_file(content: &str) -> crate::Result<CosmoConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/cosmo/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cosmo").join("config.toml"))
}
