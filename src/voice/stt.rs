//! Speech-to-text (STT) processing

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use super::recorder::Recording;
use crate::config::Settings;
use crate::{Error, Result};

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// A transcribed, non-empty piece of speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance(String);

impl Utterance {
    /// Wrap non-empty text
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the text
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts recorded audio into text
///
/// An empty string means nothing intelligible was heard.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Engine name shown on the dashboard
    fn name(&self) -> &str;

    /// Transcribe a recording
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stt`] if the engine fails
    async fn transcribe(&self, recording: &Recording) -> Result<String>;
}

/// Cleans raw transcripts: corrections, length floor, noise phrases
#[derive(Debug, Clone, Default)]
pub struct TranscriptFilter {
    min_chars: usize,
    noise_phrases: Vec<String>,
    corrections: BTreeMap<String, String>,
}

impl TranscriptFilter {
    /// Build from a settings snapshot
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            min_chars: settings.min_command_chars,
            noise_phrases: settings
                .noise_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            corrections: settings.corrections.clone(),
        }
    }

    /// Apply corrections and drop degenerate output
    #[must_use]
    pub fn clean(&self, raw: &str) -> Option<Utterance> {
        let mut text = raw.trim().to_string();
        for (wrong, right) in &self.corrections {
            if !wrong.is_empty() {
                text = text.replace(wrong.as_str(), right);
            }
        }

        if text.chars().count() < self.min_chars {
            tracing::debug!(text, "transcript too short, discarding");
            return None;
        }

        let lower = text.to_lowercase();
        if let Some(phrase) = self.noise_phrases.iter().find(|p| lower.contains(p.as_str())) {
            tracing::debug!(text, phrase, "transcript filtered as noise");
            return None;
        }

        Utterance::new(text)
    }
}

/// Transcribe and clean a recording
///
/// Engine failures and noise are both reported as `None`.
pub async fn transcribe_recording(
    transcriber: &dyn Transcriber,
    recording: &Recording,
    filter: &TranscriptFilter,
) -> Option<Utterance> {
    match transcriber.transcribe(recording).await {
        Ok(raw) => {
            tracing::debug!(transcript = %raw, "transcribed");
            filter.clean(&raw)
        }
        Err(e) => {
            tracing::warn!(error = %e, "STT failed");
            None
        }
    }
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// Transcribes speech through a hosted API
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: Option<String>,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, model: String, language: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: String, model: String, language: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            provider: SttProvider::Deepgram,
        })
    }

    /// Transcribe using `OpenAI` Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("command.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let mut url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );
        if let Some(language) = &self.language {
            url.push_str("&language=");
            url.push_str(language);
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    fn name(&self) -> &str {
        match self.provider {
            SttProvider::Whisper => "Whisper",
            SttProvider::Deepgram => "Deepgram",
        }
    }

    async fn transcribe(&self, recording: &Recording) -> Result<String> {
        let text = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(&recording.wav).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(&recording.wav).await?,
        };
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

/// Build the configured transcriber
///
/// # Errors
///
/// Returns error if the provider is unknown or its API key is missing
pub fn build_transcriber(settings: &Settings) -> Result<Box<dyn Transcriber>> {
    let stt = &settings.stt;
    let keys = &settings.api_keys;
    match stt.provider.as_str() {
        "whisper" | "openai" => Ok(Box::new(SpeechToText::new_whisper(
            keys.openai.clone().unwrap_or_default(),
            stt.model.clone(),
            stt.language.clone(),
        )?)),
        "deepgram" => Ok(Box::new(SpeechToText::new_deepgram(
            keys.deepgram.clone().unwrap_or_default(),
            stt.model.clone(),
            stt.language.clone(),
        )?)),
        other => Err(Error::Config(format!("unknown STT provider: {other}"))),
    }
}
