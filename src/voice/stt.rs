//! Speech-to-text (STT) over the `OpenAI` transcription API

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::{Error, Result};

/// Default `OpenAI` API base URL
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes recorded speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    url: Url,
}

impl SpeechToText {
    /// Create a new STT instance against the public `OpenAI` API
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: Option<SecretString>, model: String) -> Result<Self> {
        Self::with_base_url(api_key, model, DEFAULT_OPENAI_URL)
    }

    /// Create a new STT instance against a custom base URL
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the URL is invalid
    pub fn with_base_url(api_key: Option<SecretString>, model: String, base_url: &str) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.expose_secret().is_empty())
            .ok_or_else(|| Error::Config("OpenAI API key required for transcription".to_string()))?;
        let url = Url::parse(base_url)?.join("v1/audio/transcriptions")?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            url,
        })
    }

    /// Transcribe WAV audio to text
    ///
    /// `locale` is reduced to its language code (e.g. "en-US" → "en").
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: &[u8], locale: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let language = locale.split(['-', '_']).next().unwrap_or(locale).to_lowercase();

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", language);

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}
