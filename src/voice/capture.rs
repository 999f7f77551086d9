//! Audio capture from microphone

use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// How long a block read may stall before the device is considered gone
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Shape of the audio blocks a stream produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Frames per block
    pub block_size: usize,
}

impl CaptureFormat {
    /// Samples in one block (frames × channels)
    #[must_use]
    pub fn samples_per_block(&self) -> usize {
        self.block_size * usize::from(self.channels)
    }

    /// Duration covered by `samples` interleaved samples
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_of(&self, samples: usize) -> Duration {
        let frames = samples as f64 / f64::from(self.channels);
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }
}

/// An open input stream delivering fixed-size blocks
///
/// Dropping the stream closes the device.
pub trait AudioStream {
    /// Block until the next block is available
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the device stalls or disconnects
    fn read_block(&mut self) -> Result<Vec<i16>>;
}

/// Something that can open input streams
pub trait AudioSource: Send + Sync {
    /// Open a stream with the requested format
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if no suitable device is available
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn AudioStream>>;
}

/// Captures from the default input device
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrophoneSource;

impl AudioSource for MicrophoneSource {
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn AudioStream>> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Device("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| {
                c.channels() == format.channels
                    && c.min_sample_rate() <= SampleRate(format.sample_rate)
                    && c.max_sample_rate() >= SampleRate(format.sample_rate)
                    && matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32)
            })
            .ok_or_else(|| Error::Device("no suitable audio config found".to_string()))?
            .with_sample_rate(SampleRate(format.sample_rate));

        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = format.sample_rate,
            channels = config.channels,
            ?sample_format,
            "audio capture initialized"
        );

        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        let on_error = |err: cpal::StreamError| {
            tracing::error!(error = %err, "audio capture error");
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.to_vec());
                },
                on_error,
                None,
            ),
            _ => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.iter().map(|&s| f32_to_i16(s)).collect());
                },
                on_error,
                None,
            ),
        }
        .map_err(|e| Error::Device(e.to_string()))?;

        stream.play().map_err(|e| Error::Device(e.to_string()))?;
        tracing::debug!("audio capture started");

        Ok(Box::new(MicrophoneStream {
            _stream: stream,
            rx,
            pending: VecDeque::new(),
            block_len: format.samples_per_block(),
        }))
    }
}

struct MicrophoneStream {
    _stream: Stream,
    rx: mpsc::Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    block_len: usize,
}

impl AudioStream for MicrophoneStream {
    fn read_block(&mut self) -> Result<Vec<i16>> {
        while self.pending.len() < self.block_len {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(Error::Device("audio read timed out".to_string()));
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(Error::Device("audio stream disconnected".to_string()));
                }
            }
        }

        Ok(self.pending.drain(..self.block_len).collect())
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        tracing::debug!("audio capture stopped");
    }
}

#[allow(clippy::cast_possible_truncation)]
fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Encode 16-bit samples as WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Device(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Device(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Device(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
