//! Configuration management
//!
//! Settings are an immutable snapshot published through [`ConfigStore`].
//! Readers call [`ConfigStore::snapshot`] once at the start of an operation and
//! keep that `Arc` for its duration; a reload swaps in a fully built snapshot,
//! so readers see either the old or the new one, never a mix.

pub mod file;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;

use crate::{Error, Result};

/// Assistant settings snapshot
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen to the microphone (false = text-only mode)
    pub voice_input_enabled: bool,

    /// Wake phrases, matched in this order
    pub wake_words: Vec<String>,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Capture channel count
    pub channels: u16,

    /// Energy below which a block counts as silence (0.0 - 1.0)
    pub volume_threshold: f32,

    /// Energy above `volume_threshold * multiplier` counts as speech
    pub speech_threshold_multiplier: f32,

    /// Seconds of silence after speech that end an utterance
    pub silence_duration: f32,

    /// Hard cap on a single recording, in seconds
    pub max_record_duration: f32,

    /// Recordings whose WAV payload is smaller than this are discarded
    pub min_file_size: usize,

    /// Samples per captured block
    pub block_size: usize,

    /// Seconds to wait for a command after a bare wake phrase
    pub command_window: f32,

    /// Seconds to wait for a yes/no answer to a reload prompt
    pub confirm_timeout: f32,

    /// Seconds between config file modification checks
    pub watch_interval: f32,

    /// Commands shorter than this are treated as noise
    pub min_command_chars: usize,

    /// Transcription artifacts that are never treated as commands
    pub noise_phrases: Vec<String>,

    /// Transcript corrections applied after every transcription (wrong -> right)
    pub corrections: BTreeMap<String, String>,

    /// Where to write the last successful recording, if anywhere
    pub scratch_recording: Option<PathBuf>,

    /// Speech-to-text settings
    pub stt: SttSettings,

    /// Text-to-speech settings
    pub tts: TtsSettings,

    /// AI backend provider ("groq", "openai", "local")
    pub ai_provider: String,

    /// Optional model override for the AI backend
    pub ai_model: Option<String>,

    /// API keys for external services
    pub api_keys: ApiKeys,

    /// Built-in integrations
    pub integrations: IntegrationsSettings,
}

/// Speech-to-text settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SttSettings {
    /// Provider ("whisper" or "deepgram")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Spoken language hint (ISO 639-1)
    pub language: Option<String>,
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            provider: "whisper".to_string(),
            model: "whisper-1".to_string(),
            language: Some("es".to_string()),
        }
    }
}

/// Text-to-speech settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    /// Provider ("openai", "elevenlabs", "none")
    pub provider: String,

    /// Voice identifier (`OpenAI` voice name or `ElevenLabs` voice id)
    pub voice: String,

    /// Optional model override
    pub model: Option<String>,

    /// Speed multiplier (`OpenAI` only)
    pub speed: f32,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            voice: "alloy".to_string(),
            model: None,
            speed: 1.0,
        }
    }
}

/// API keys for external services
///
/// Environment variables take precedence when set.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    /// Groq API key
    pub groq: Option<String>,

    /// `OpenAI` API key (chat, Whisper and TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` API key
    pub elevenlabs: Option<String>,

    /// Deepgram API key
    pub deepgram: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "<set>");
        f.debug_struct("ApiKeys")
            .field("groq", &mask(&self.groq))
            .field("openai", &mask(&self.openai))
            .field("elevenlabs", &mask(&self.elevenlabs))
            .field("deepgram", &mask(&self.deepgram))
            .finish()
    }
}

impl ApiKeys {
    /// Overlay keys found in the environment
    #[must_use]
    pub fn with_env(mut self) -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if let Some(k) = env("GROQ_API_KEY") {
            self.groq = Some(k);
        }
        if let Some(k) = env("OPENAI_API_KEY") {
            self.openai = Some(k);
        }
        if let Some(k) = env("ELEVENLABS_API_KEY") {
            self.elevenlabs = Some(k);
        }
        if let Some(k) = env("DEEPGRAM_API_KEY") {
            self.deepgram = Some(k);
        }
        self
    }
}

/// Built-in integration settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IntegrationsSettings {
    /// Application launcher
    pub launcher: LauncherSettings,

    /// Session control (lock, reboot, shutdown...)
    pub session: SessionSettings,
}

/// Application launcher settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Enable the launcher
    pub enabled: bool,

    /// Application name -> command line
    pub apps: BTreeMap<String, String>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            apps: BTreeMap::new(),
        }
    }
}

/// Session control settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Enable session control (off unless explicitly enabled)
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voice_input_enabled: true,
            wake_words: vec![
                "jarvis".to_string(),
                "oye jarvis".to_string(),
                "hey jarvis".to_string(),
            ],
            sample_rate: 16000,
            channels: 1,
            volume_threshold: 0.08,
            speech_threshold_multiplier: 1.5,
            silence_duration: 1.5,
            max_record_duration: 12.0,
            min_file_size: 1000,
            block_size: 1024,
            command_window: 10.0,
            confirm_timeout: 10.0,
            watch_interval: 1.0,
            min_command_chars: 3,
            noise_phrases: vec![
                "subtítulos por la comunidad de amara.org".to_string(),
                "amara.org".to_string(),
                "suscríbete".to_string(),
                "gracias por ver".to_string(),
            ],
            corrections: BTreeMap::new(),
            scratch_recording: None,
            stt: SttSettings::default(),
            tts: TtsSettings::default(),
            ai_provider: "groq".to_string(),
            ai_model: None,
            api_keys: ApiKeys::default(),
            integrations: IntegrationsSettings::default(),
        }
    }
}

/// Upper bound for any setting measured in seconds (one day)
pub const MAX_SECONDS: f32 = 86_400.0;

/// Convert a seconds setting, clamped to `0..=MAX_SECONDS`
///
/// Unvalidated values never panic: NaN becomes zero.
fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.clamp(0.0, MAX_SECONDS)).unwrap_or_default()
}

impl Settings {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        let seconds = [
            ("silence_duration", self.silence_duration),
            ("max_record_duration", self.max_record_duration),
            ("command_window", self.command_window),
            ("confirm_timeout", self.confirm_timeout),
            ("watch_interval", self.watch_interval),
        ];
        for (name, value) in seconds {
            if !(0.0..=MAX_SECONDS).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be between 0 and {MAX_SECONDS} seconds, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.volume_threshold) {
            return Err(Error::Config(format!(
                "volume_threshold must be within 0.0..=1.0, got {}",
                self.volume_threshold
            )));
        }
        if !self.speech_threshold_multiplier.is_finite() || self.speech_threshold_multiplier < 1.0
        {
            return Err(Error::Config(format!(
                "speech_threshold_multiplier must be at least 1.0, got {}",
                self.speech_threshold_multiplier
            )));
        }
        if self.sample_rate == 0 || self.channels == 0 || self.block_size == 0 {
            return Err(Error::Config(
                "sample_rate, channels and block_size must be non-zero".to_string(),
            ));
        }
        if self.wake_words.iter().all(|w| w.trim().is_empty()) {
            return Err(Error::Config("at least one wake word is required".to_string()));
        }

        Ok(())
    }

    /// Follow-up window after a bare wake phrase
    #[must_use]
    pub fn command_window(&self) -> Duration {
        seconds(self.command_window)
    }

    /// Timeout for reload confirmation replies
    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        seconds(self.confirm_timeout)
    }

    /// Interval between config file checks
    #[must_use]
    pub fn watch_interval(&self) -> Duration {
        seconds(self.watch_interval)
    }

    /// Silence after speech that ends an utterance
    #[must_use]
    pub fn silence_duration(&self) -> Duration {
        seconds(self.silence_duration)
    }

    /// Hard cap on one recording
    #[must_use]
    pub fn max_record_duration(&self) -> Duration {
        seconds(self.max_record_duration)
    }

    /// One line per feature, API keys shown by presence only
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        let on_off = |b: bool| if b { "ON" } else { "OFF" };
        let key = |k: &Option<String>, name: &str| {
            format!("{}{name}", if k.is_some() { "+" } else { "-" })
        };

        let wake = self
            .wake_words
            .iter()
            .map(|w| format!("\"{w}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let mut apps: Vec<&str> = self
            .integrations
            .launcher
            .apps
            .keys()
            .map(String::as_str)
            .collect();
        if apps.is_empty() {
            apps.push("no apps");
        }

        vec![
            format!("Wake words: {wake}"),
            format!(
                "Audio: voice {}, rate {}kHz, channels {}, threshold {}, speech x{}",
                on_off(self.voice_input_enabled),
                self.sample_rate / 1000,
                self.channels,
                self.volume_threshold,
                self.speech_threshold_multiplier
            ),
            format!(
                "Recording: max {}s, silence {}s, min {} bytes",
                self.max_record_duration, self.silence_duration, self.min_file_size
            ),
            format!(
                "STT: {} ({}), language {}",
                self.stt.provider,
                self.stt.model,
                self.stt.language.as_deref().unwrap_or("auto")
            ),
            format!("TTS: {} (voice {})", self.tts.provider, self.tts.voice),
            format!(
                "AI: {}{}",
                self.ai_provider,
                self.ai_model
                    .as_deref()
                    .map(|m| format!(" ({m})"))
                    .unwrap_or_default()
            ),
            format!(
                "API keys: {} {} {} {}",
                key(&self.api_keys.groq, "Groq"),
                key(&self.api_keys.openai, "OpenAI"),
                key(&self.api_keys.elevenlabs, "ElevenLabs"),
                key(&self.api_keys.deepgram, "Deepgram")
            ),
            format!(
                "Integrations: launcher {} [{}], session {}",
                on_off(self.integrations.launcher.enabled),
                apps.join(", "),
                on_off(self.integrations.session.enabled)
            ),
            format!(
                "Windows: command {}s, confirm {}s, corrections {}",
                self.command_window,
                self.confirm_timeout,
                self.corrections.len()
            ),
        ]
    }
}

/// Atomically swappable settings bound to a config file
pub struct ConfigStore {
    path: PathBuf,
    current: ArcSwap<Settings>,
}

impl ConfigStore {
    /// Load settings from `path`
    ///
    /// A missing file yields defaults; a malformed one is an error.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read, parsed or validated
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = if path.exists() {
            file::read_settings(&path)?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Settings {
                api_keys: ApiKeys::default().with_env(),
                ..Settings::default()
            }
        };

        Ok(Self::with_settings(path, settings))
    }

    /// Bind already-built settings to a path
    #[must_use]
    pub fn with_settings(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            current: ArcSwap::from_pointee(settings),
        }
    }

    /// Config file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Re-read the config file and publish it
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigReload`] if the file cannot be read, parsed or
    /// validated; the previous snapshot remains in effect
    pub fn reload(&self) -> Result<Arc<Settings>> {
        let settings = file::read_settings(&self.path).map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "config reload rejected");
            Error::ConfigReload(e.to_string())
        })?;

        let settings = Arc::new(settings);
        self.current.store(Arc::clone(&settings));
        tracing::info!(path = %self.path.display(), "configuration reloaded");
        Ok(settings)
    }

    /// Publish a snapshot directly
    pub fn replace(&self, settings: Settings) {
        self.current.store(Arc::new(settings));
    }
}
