//! Utterance recording
//!
//! Captures blocks from an [`AudioSource`] until the utterance ends, using an
//! energy threshold with a hysteresis band:
//!
//! ```text
//!  energy > threshold × multiplier   speech: mark detected, reset silence
//!  energy < threshold                silence += block duration
//!  otherwise                         silence += block duration / 2
//! ```
//!
//! Recording stops at the time cap, or once speech has been heard and enough
//! silence has followed it. Silence alone never ends a recording.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::capture::{AudioSource, CaptureFormat, samples_to_wav};
use super::energy::energy;
use crate::Result;
use crate::config::Settings;

/// Thresholds and limits for one recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingParams {
    /// Hard cap on recording length
    pub max_duration: Duration,
    /// Energy below which a block is silence
    pub silence_threshold: f32,
    /// Silence after speech that ends the utterance
    pub silence_duration: Duration,
    /// Speech threshold as a multiple of `silence_threshold`
    pub speech_multiplier: f32,
    /// WAV payloads smaller than this are discarded
    pub min_payload_bytes: usize,
    /// Where to keep a copy of the last successful recording
    pub scratch_path: Option<PathBuf>,
}

impl RecordingParams {
    /// Build from a settings snapshot
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_duration: settings.max_record_duration(),
            silence_threshold: settings.volume_threshold,
            silence_duration: settings.silence_duration(),
            speech_multiplier: settings.speech_threshold_multiplier,
            min_payload_bytes: settings.min_file_size,
            scratch_path: settings.scratch_recording.clone(),
        }
    }

    /// Same limits with a different time cap
    #[must_use]
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }
}

/// Capture format from a settings snapshot
#[must_use]
pub fn capture_format(settings: &Settings) -> CaptureFormat {
    CaptureFormat {
        sample_rate: settings.sample_rate,
        channels: settings.channels,
        block_size: settings.block_size,
    }
}

/// Why a recording stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Elapsed time reached the cap
    TimeCap,
    /// Speech followed by enough silence
    EndOfUtterance,
}

/// A finished recording
#[derive(Debug, Clone)]
pub struct Recording {
    /// Interleaved 16-bit samples
    pub samples: Vec<i16>,
    /// The same audio encoded as WAV
    pub wav: Vec<u8>,
    /// Audio length
    pub duration: Duration,
    /// Why capture stopped
    pub stop: StopReason,
}

/// Accumulator for one capture session
#[derive(Debug, Default)]
struct RecordingSession {
    samples: Vec<i16>,
    blocks: usize,
    elapsed: Duration,
    silence: Duration,
    speech_detected: bool,
}

impl RecordingSession {
    /// Append a block and return whether recording should stop
    fn push(
        &mut self,
        block: &[i16],
        block_duration: Duration,
        params: &RecordingParams,
    ) -> Option<StopReason> {
        let level = energy(block);
        self.samples.extend_from_slice(block);
        self.blocks += 1;
        self.elapsed += block_duration;

        if level > params.silence_threshold * params.speech_multiplier {
            self.speech_detected = true;
            self.silence = Duration::ZERO;
        } else if level < params.silence_threshold {
            self.silence += block_duration;
        } else {
            self.silence += block_duration / 2;
        }

        if self.blocks % 10 == 0 {
            tracing::trace!(
                level,
                speech = self.speech_detected,
                silence_ms = self.silence.as_millis(),
                "recording"
            );
        }

        if self.elapsed >= params.max_duration {
            return Some(StopReason::TimeCap);
        }
        if self.speech_detected && self.silence >= params.silence_duration {
            return Some(StopReason::EndOfUtterance);
        }
        None
    }
}

/// Records one utterance at a time from an audio source
pub struct UtteranceRecorder {
    source: Arc<dyn AudioSource>,
    device: Mutex<()>,
}

impl UtteranceRecorder {
    /// Create a recorder over `source`
    #[must_use]
    pub fn new(source: Arc<dyn AudioSource>) -> Self {
        Self {
            source,
            device: Mutex::new(()),
        }
    }

    /// Record until the utterance ends or the time cap is reached
    ///
    /// Blocks the calling thread. Concurrent callers are serialized. Any
    /// failure is logged and reported as "nothing captured".
    #[must_use]
    pub fn record(&self, format: &CaptureFormat, params: &RecordingParams) -> Option<Recording> {
        let _device = self.device.lock().unwrap_or_else(PoisonError::into_inner);

        match self.try_record(format, params) {
            Ok(recording) => recording,
            Err(e) => {
                tracing::warn!(error = %e, "recording failed");
                None
            }
        }
    }

    /// Record on a blocking thread
    pub async fn record_async(
        self: &Arc<Self>,
        format: CaptureFormat,
        params: RecordingParams,
    ) -> Option<Recording> {
        let recorder = Arc::clone(self);
        tokio::task::spawn_blocking(move || recorder.record(&format, &params))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "recording task failed");
                None
            })
    }

    fn try_record(
        &self,
        format: &CaptureFormat,
        params: &RecordingParams,
    ) -> Result<Option<Recording>> {
        tracing::debug!(max_secs = params.max_duration.as_secs_f32(), "recording started");

        let mut stream = self.source.open(format)?;
        let mut session = RecordingSession::default();

        let stop = loop {
            let block = stream.read_block()?;
            let block_duration = format.duration_of(block.len());
            if let Some(reason) = session.push(&block, block_duration, params) {
                break reason;
            }
        };
        drop(stream);

        tracing::debug!(?stop, elapsed_ms = session.elapsed.as_millis(), "recording stopped");

        if session.blocks == 0 || session.samples.is_empty() {
            tracing::debug!("no audio captured");
            return Ok(None);
        }

        let wav = samples_to_wav(&session.samples, format.sample_rate, format.channels)?;
        if wav.len() < params.min_payload_bytes {
            tracing::debug!(bytes = wav.len(), "recording too small, discarding");
            return Ok(None);
        }

        if let Some(path) = &params.scratch_path {
            std::fs::write(path, &wav)?;
            tracing::debug!(path = %path.display(), bytes = wav.len(), "recording saved");
        }

        Ok(Some(Recording {
            samples: session.samples,
            wav,
            duration: session.elapsed,
            stop,
        }))
    }
}
