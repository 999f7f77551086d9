//! Shared test utilities
//!
//! Fakes for every engine seam so the assistant runs without audio hardware,
//! network access or real processes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use jarvis_voice::ai::AiBackend;
use jarvis_voice::assistant::Engines;
use jarvis_voice::events::MemorySink;
use jarvis_voice::integrations::ProcessRunner;
use jarvis_voice::voice::{AudioSource, AudioStream, CaptureFormat, Recording, Speaker, Transcriber};
use jarvis_voice::{Assistant, AssistantBuilder, ConfigStore, Error, Result, Settings};

/// Test capture format: 16 kHz mono, 100 ms blocks
pub const FORMAT: CaptureFormat = CaptureFormat {
    sample_rate: 16000,
    channels: 1,
    block_size: 1600,
};

/// One block of a sine tone at `amplitude` (0.0 - 1.0)
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn tone_block(amplitude: f32) -> Vec<i16> {
    (0..FORMAT.block_size)
        .map(|i| {
            let t = i as f32 / FORMAT.sample_rate as f32;
            (amplitude * 32767.0 * (2.0 * PI * 440.0 * t).sin()) as i16
        })
        .collect()
}

/// One block of silence
#[must_use]
pub fn silence_block() -> Vec<i16> {
    vec![0; FORMAT.block_size]
}

/// Audio source replaying a fixed block script, then silence forever
#[derive(Clone, Default)]
pub struct ScriptedSource {
    blocks: Vec<Vec<i16>>,
    opened: Arc<AtomicUsize>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(blocks: Vec<Vec<i16>>) -> Self {
        Self {
            blocks,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of streams opened so far
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

struct ScriptedStream {
    blocks: VecDeque<Vec<i16>>,
    block_len: usize,
}

impl AudioStream for ScriptedStream {
    fn read_block(&mut self) -> Result<Vec<i16>> {
        Ok(self
            .blocks
            .pop_front()
            .unwrap_or_else(|| vec![0; self.block_len]))
    }
}

impl AudioSource for ScriptedSource {
    fn open(&self, format: &CaptureFormat) -> Result<Box<dyn AudioStream>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            blocks: self.blocks.iter().cloned().collect(),
            block_len: format.samples_per_block(),
        }))
    }
}

/// Audio source with no device behind it
pub struct MissingDevice;

impl AudioSource for MissingDevice {
    fn open(&self, _format: &CaptureFormat) -> Result<Box<dyn AudioStream>> {
        Err(Error::Device("no input device available".to_string()))
    }
}

/// Transcriber returning scripted transcripts in order
#[derive(Clone, Default)]
pub struct ScriptedTranscriber {
    transcripts: Arc<Mutex<VecDeque<String>>>,
}

impl ScriptedTranscriber {
    #[must_use]
    pub fn new(transcripts: &[&str]) -> Self {
        Self {
            transcripts: Arc::new(Mutex::new(
                transcripts.iter().map(ToString::to_string).collect(),
            )),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn transcribe(&self, _recording: &Recording) -> Result<String> {
        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Stt("script exhausted".to_string()))
    }
}

/// Backend that answers every prompt and remembers it
///
/// With a gate, each answer waits for one permit.
#[derive(Clone, Default)]
pub struct EchoBackend {
    prompts: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    gate: Option<Arc<Semaphore>>,
}

impl EchoBackend {
    /// Prompts received so far
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Context passed with the most recent prompt
    #[must_use]
    pub fn last_context(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .map(|(_, c)| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AiBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn ask(&self, prompt: &str, context: &[String]) -> String {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), context.to_vec()));
        format!("respuesta a {prompt}")
    }
}

/// Backend that panics on every prompt
pub struct PanickingBackend;

#[async_trait]
impl AiBackend for PanickingBackend {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn ask(&self, _prompt: &str, _context: &[String]) -> String {
        panic!("backend exploded")
    }
}

/// Speaker that records what it was asked to say
#[derive(Clone, Default)]
pub struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSpeaker {
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    fn name(&self) -> &str {
        "recording"
    }

    async fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

/// Process runner that records instead of spawning
#[derive(Clone, Default)]
pub struct RecordingRunner {
    spawned: Arc<Mutex<Vec<String>>>,
}

impl RecordingRunner {
    /// Spawned command lines, program and args joined by spaces
    #[must_use]
    pub fn spawned(&self) -> Vec<String> {
        self.spawned.lock().unwrap().clone()
    }
}

impl ProcessRunner for RecordingRunner {
    fn spawn(&self, program: &str, args: &[&str]) -> std::io::Result<()> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.spawned.lock().unwrap().push(line);
        Ok(())
    }
}

/// Settings for tests: text-only, short windows, no API keys
#[must_use]
pub fn test_settings() -> Settings {
    Settings {
        voice_input_enabled: false,
        command_window: 2.0,
        confirm_timeout: 1.0,
        ..Settings::default()
    }
}

/// An assistant wired to fakes
pub struct Harness {
    pub assistant: Arc<Assistant>,
    pub commands: tokio::sync::mpsc::UnboundedReceiver<String>,
    pub sink: Arc<MemorySink>,
    pub backend: EchoBackend,
    pub speaker: RecordingSpeaker,
    pub runner: RecordingRunner,
    pub exits: Arc<AtomicUsize>,
}

impl Harness {
    /// Number of times the exit hook ran
    #[must_use]
    pub fn exit_count(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }
}

/// Harness options
pub struct HarnessBuilder {
    settings: Settings,
    path: std::path::PathBuf,
    source: Option<ScriptedSource>,
    transcriber: Option<ScriptedTranscriber>,
    panicking: bool,
    gate: Option<Arc<Semaphore>>,
}

impl HarnessBuilder {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            path: std::env::temp_dir().join("jarvis-test-missing-config.json"),
            source: None,
            transcriber: None,
            panicking: false,
            gate: None,
        }
    }

    #[must_use]
    pub fn config_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn voice(mut self, source: ScriptedSource, transcriber: ScriptedTranscriber) -> Self {
        self.source = Some(source);
        self.transcriber = Some(transcriber);
        self
    }

    /// Hold every answer until `gate` hands out a permit
    #[must_use]
    pub fn gated_backend(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    #[must_use]
    pub fn panicking_backend(mut self) -> Self {
        self.panicking = true;
        self
    }

    #[must_use]
    pub fn build(self) -> Harness {
        let sink = Arc::new(MemorySink::new());
        let backend = EchoBackend {
            gate: self.gate,
            ..EchoBackend::default()
        };
        let speaker = RecordingSpeaker::default();
        let runner = RecordingRunner::default();
        let exits = Arc::new(AtomicUsize::new(0));

        let factory = {
            let backend = backend.clone();
            let speaker = speaker.clone();
            let transcriber = self.transcriber.clone();
            let panicking = self.panicking;
            Arc::new(move |_: &Settings| Engines {
                transcriber: transcriber
                    .clone()
                    .map(|t| Box::new(t) as Box<dyn Transcriber>),
                speaker: Box::new(speaker.clone()),
                backend: if panicking {
                    Box::new(PanickingBackend)
                } else {
                    Box::new(backend.clone())
                },
            })
        };

        let store = Arc::new(ConfigStore::with_settings(self.path, self.settings));
        let hook_exits = Arc::clone(&exits);
        let mut builder = AssistantBuilder::new(store, sink.clone())
            .engine_factory(factory)
            .process_runner(Arc::new(runner.clone()))
            .on_exit(Arc::new(move || {
                hook_exits.fetch_add(1, Ordering::SeqCst);
            }));

        builder = match self.source {
            Some(source) => builder.audio_source(Arc::new(source)),
            None => builder.audio_source(Arc::new(MissingDevice)),
        };

        let (assistant, commands) = builder.build();
        Harness {
            assistant,
            commands,
            sink,
            backend,
            speaker,
            runner,
            exits,
        }
    }
}

/// Harness over `settings` with no voice input
#[must_use]
pub fn harness(settings: Settings) -> Harness {
    HarnessBuilder::new(settings).build()
}
