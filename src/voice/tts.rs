//! Text-to-speech (TTS) processing

use async_trait::async_trait;

use super::playback::AudioPlayback;
use crate::config::Settings;
use crate::{Error, Result};

/// Speaks text aloud
///
/// Implementations log their own failures; speaking never fails the caller.
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Engine name shown on the dashboard
    fn name(&self) -> &str;

    /// Speak `text`, returning once playback has finished
    async fn speak(&self, text: &str);
}

/// Speaker that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeaker;

#[async_trait]
impl Speaker for SilentSpeaker {
    fn name(&self) -> &str {
        "none"
    }

    async fn speak(&self, text: &str) {
        tracing::debug!(text, "speech output disabled");
    }
}

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, speed: f32, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            speed: 1.0,
            model,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }

    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn synthesize_and_play(&self, text: &str) -> Result<()> {
        let mp3 = self.synthesize(text).await?;
        tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&mp3))
            .await
            .map_err(|e| Error::Tts(format!("playback task failed: {e}")))?
    }
}

#[async_trait]
impl Speaker for TextToSpeech {
    fn name(&self) -> &str {
        match self.provider {
            TtsProvider::OpenAI => "OpenAI",
            TtsProvider::ElevenLabs => "ElevenLabs",
        }
    }

    async fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if let Err(e) = self.synthesize_and_play(text).await {
            tracing::warn!(error = %e, "TTS failed");
        }
    }
}

/// Build the configured speaker
///
/// Unknown providers and missing keys fall back to [`SilentSpeaker`].
#[must_use]
pub fn build_speaker(settings: &Settings) -> Box<dyn Speaker> {
    let tts = &settings.tts;
    let keys = &settings.api_keys;
    let built = match tts.provider.as_str() {
        "openai" => TextToSpeech::new_openai(
            keys.openai.clone().unwrap_or_default(),
            tts.voice.clone(),
            tts.speed,
            tts.model.clone().unwrap_or_else(|| "tts-1".to_string()),
        ),
        "elevenlabs" => TextToSpeech::new_elevenlabs(
            keys.elevenlabs.clone().unwrap_or_default(),
            tts.voice.clone(),
            tts.model
                .clone()
                .unwrap_or_else(|| "eleven_multilingual_v2".to_string()),
        ),
        "none" | "" => return Box::new(SilentSpeaker),
        other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
    };

    match built {
        Ok(tts) => Box::new(tts),
        Err(e) => {
            tracing::warn!(error = %e, "TTS unavailable, speech output disabled");
            Box::new(SilentSpeaker)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_silent() {
        assert_eq!(build_speaker(&Settings::default()).name(), "none");
    }

    #[test]
    fn test_missing_key_falls_back_to_silent() {
        let mut settings = Settings::default();
        settings.tts.provider = "openai".to_string();
        settings.api_keys.openai = None;
        assert_eq!(build_speaker(&settings).name(), "none");
    }

    #[test]
    fn test_configured_provider_is_built() {
        let mut settings = Settings::default();
        settings.tts.provider = "elevenlabs".to_string();
        settings.api_keys.elevenlabs = Some("key".to_string());
        assert_eq!(build_speaker(&settings).name(), "ElevenLabs");
    }
}
