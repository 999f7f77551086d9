//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate assumed when a decoded stream reports none
const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Decoded mono audio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples in `-1.0..=1.0`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Plays audio to the default output device
///
/// Playback blocks the calling thread until the audio has drained.
pub struct AudioPlayback {
    device: Device,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Device("no output device available".to_string()))?;
        Ok(Self { device })
    }

    /// Decode and play MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let audio = decode_mp3(mp3_data)?;
        self.play(&audio)
    }

    /// Play decoded audio
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the stream
    pub fn play(&self, audio: &DecodedAudio) -> Result<()> {
        if audio.samples.is_empty() {
            return Ok(());
        }

        let config = self.output_config(audio.sample_rate)?;
        let channels = usize::from(config.channels);

        let samples: Arc<[f32]> = Arc::from(audio.samples.as_slice());
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            self.device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or(0.0);
                            frame.fill(sample);
                            if pos < samples.len() {
                                pos += 1;
                            }
                        }
                        position.store(pos, Ordering::Relaxed);
                        if pos >= samples.len() {
                            finished.store(true, Ordering::Release);
                        }
                    },
                    |err: cpal::StreamError| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Device(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Device(e.to_string()))?;

        let length = duration_of(samples.len(), audio.sample_rate);
        let deadline = Instant::now() + length + Duration::from_millis(500);
        while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }

        // let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);

        tracing::debug!(samples = samples.len(), "playback complete");
        Ok(())
    }

    fn output_config(&self, sample_rate: u32) -> Result<StreamConfig> {
        let rate = SampleRate(sample_rate);
        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        };

        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| supports(c, 1))
            .or_else(|| {
                self.device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2))
            })
            .ok_or_else(|| Error::Device("no suitable output config found".to_string()))?;

        let config = supported.with_sample_rate(rate).config();
        tracing::debug!(
            device = self.device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio playback initialized"
        );
        Ok(config)
    }
}

#[allow(clippy::cast_precision_loss)]
fn duration_of(samples: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate.max(1)))
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut audio = DecodedAudio {
        samples: Vec::new(),
        sample_rate: DEFAULT_SAMPLE_RATE,
    };

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if let Ok(rate) = u32::try_from(frame.sample_rate)
                    && rate > 0
                {
                    audio.sample_rate = rate;
                }
                let channels = frame.channels.max(1);
                audio.samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    #[allow(clippy::cast_precision_loss)]
                    let mean = sum / chunk.len() as f32;
                    mean
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Tts(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(audio)
}
