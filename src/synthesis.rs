//! Speech synthesis client
//!
//! Sends text to the ElevenLabs streaming endpoint, maps each upstream
//! status to its own [`SynthesisError`], and materializes the returned audio
//! through the [`AudioAssetStore`].
//!
//! Voice IDs are validated before being interpolated into the URL path.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use url::Url;

use crate::config::{SynthesisConfig, endpoint_url};
use crate::error::SynthesisError;
use crate::voice::{AudioAsset, AudioAssetStore};
use crate::{Error, Result};

/// A remote capability that turns text into a playable asset
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`; the caller owns the returned asset
    async fn synthesize(&self, text: &str) -> std::result::Result<AudioAsset, SynthesisError>;
}

/// Validate a voice ID: 1–128 characters, alphanumeric plus hyphens
///
/// # Errors
///
/// Returns a configuration error describing the problem
pub fn validate_voice_id(voice_id: &str) -> Result<()> {
    if voice_id.is_empty() {
        return Err(Error::Config("voice ID must not be empty".to_string()));
    }
    if voice_id.len() > 128 {
        return Err(Error::Config(
            "voice ID exceeds maximum length of 128 characters".to_string(),
        ));
    }
    if !voice_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(Error::Config(format!(
            "voice ID contains invalid characters (only alphanumeric and hyphens allowed): {voice_id}"
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// HTTP client for ElevenLabs text-to-speech
pub struct SynthesisClient {
    client: reqwest::Client,
    url: Url,
    api_key: SecretString,
    model_id: String,
    voice_settings: VoiceSettings,
    store: Arc<AudioAssetStore>,
}

impl SynthesisClient {
    /// Create a client from validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing, the voice ID is invalid, or
    /// the HTTP client cannot be built
    pub fn new(config: &SynthesisConfig, store: Arc<AudioAssetStore>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("ElevenLabs API key required for synthesis".to_string()))?;
        validate_voice_id(&config.voice_id)?;

        let url = endpoint_url(
            &config.base_url,
            &format!("v1/text-to-speech/{}/stream", config.voice_id),
        )?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        tracing::debug!(url = %url, model = %config.model_id, "synthesis client initialized");

        Ok(Self {
            client,
            url,
            api_key,
            model_id: config.model_id.clone(),
            voice_settings: VoiceSettings {
                stability: config.stability,
                similarity_boost: config.similarity_boost,
            },
            store,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for SynthesisClient {
    async fn synthesize(&self, text: &str) -> std::result::Result<AudioAsset, SynthesisError> {
        tracing::debug!(url = %self.url, chars = text.len(), "sending synthesis request");

        let response = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, "audio/mpeg")
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&SynthesisRequest {
                text,
                model_id: &self.model_id,
                voice_settings: self.voice_settings,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "synthesis request failed");
                SynthesisError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = SynthesisError::from_status(status.as_u16());
            tracing::warn!(status = %status, body = %body, error = %err, "synthesis provider error");
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("audio/") {
            tracing::warn!(content_type = %content_type, "synthesis returned non-audio content");
            return Err(SynthesisError::UnexpectedContent(content_type));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;
        if audio.is_empty() {
            return Err(SynthesisError::UnexpectedContent("empty audio payload".to_string()));
        }

        tracing::debug!(bytes = audio.len(), "received synthesized audio");

        self.store
            .materialize(&audio)
            .await
            .map_err(|e| SynthesisError::Storage(e.to_string()))
    }
}
