//! Assistant runtime
//!
//! Owns the state machine, the listening flag, the engines and the integration
//! registry, and runs the voice loop and the text command loop on top of them.
//!
//! ```text
//!  microphone ─► recorder ─► transcriber ─► state machine ─► resolver ─► sink
//!                                               ▲                 │
//!  stdin ─► input router ───────────────────────┘                 └─► speaker
//! ```
//!
//! Every command is resolved inside a Busy boundary: a guard holds a listening
//! pause for the duration and, however the resolution ends (answer, error or
//! panic), puts the machine back in Idle and releases the pause.

mod listening;
pub mod state;

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub use listening::{ListeningFlag, PauseGuard};
pub use state::{
    AssistantState, CommandRules, IgnoreReason, Rejection, StateMachine, Transition,
    is_exit_command,
};

use crate::ai::{AiBackend, build_backend};
use crate::config::{ConfigStore, Settings};
use crate::events::{EngineKind, PresentationSink, Sender, UiEvent};
use crate::input::{InputRouter, ReplyClaim};
use crate::integrations::{
    IntegrationRegistry, ProcessRunner, SystemRunner, build_integrations,
};
use crate::memory::ConversationMemory;
use crate::race::first_reply;
use crate::resolver::{NO_RESPONSE, ResponseSource, resolve};
use crate::voice::{
    AudioSource, MicrophoneSource, RecordingParams, Speaker, TranscriptFilter, Transcriber,
    UtteranceRecorder, Utterance, build_speaker, build_transcriber, capture_format,
    transcribe_recording,
};

/// Poll interval while listening is paused or voice input is off
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// Prompt after a bare wake phrase
pub const ARMED_PROMPT: &str = "Te escucho. ¿Qué necesitas?";

/// The engines used to transcribe, answer and speak
pub struct Engines {
    /// Speech-to-text, if one could be configured
    pub transcriber: Option<Box<dyn Transcriber>>,
    /// Speech output
    pub speaker: Box<dyn Speaker>,
    /// Reply generation
    pub backend: Box<dyn AiBackend>,
}

impl Engines {
    /// Build the engines named in `settings`
    ///
    /// A transcriber that cannot be built is logged and left out.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let transcriber = match build_transcriber(settings) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!(error = %e, "speech-to-text unavailable");
                None
            }
        };

        Self {
            transcriber,
            speaker: build_speaker(settings),
            backend: build_backend(settings),
        }
    }
}

/// Builds [`Engines`] from a settings snapshot
pub type EngineFactory = Arc<dyn Fn(&Settings) -> Engines + Send + Sync>;

/// Called when an exit command is received
pub type ExitHook = Arc<dyn Fn() + Send + Sync>;

/// Channel a command arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Spoken; the answer is spoken too
    Voice,
    /// Typed; the answer is only displayed
    Text,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Voice => "voz",
            Self::Text => "texto",
        })
    }
}

/// Which flow is waiting for a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listener {
    /// The follow-up window after a bare wake phrase
    CommandWindow,
    /// A question put by [`Assistant::ask`]
    Question,
}

/// A reply collected while waiting on both channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Spoken reply
    Voice(Utterance),
    /// Typed reply
    Text(String),
}

impl Reply {
    /// Reply text
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Voice(u) => u.as_str(),
            Self::Text(t) => t,
        }
    }
}

/// Configures an [`Assistant`]
pub struct AssistantBuilder {
    config: Arc<ConfigStore>,
    sink: Arc<dyn PresentationSink>,
    source: Arc<dyn AudioSource>,
    engine_factory: EngineFactory,
    runner: Arc<dyn ProcessRunner>,
    on_exit: ExitHook,
    text_only: bool,
}

impl AssistantBuilder {
    /// Start from a config store and a presentation sink
    #[must_use]
    pub fn new(config: Arc<ConfigStore>, sink: Arc<dyn PresentationSink>) -> Self {
        Self {
            config,
            sink,
            source: Arc::new(MicrophoneSource),
            engine_factory: Arc::new(Engines::from_settings),
            runner: Arc::new(SystemRunner),
            on_exit: Arc::new(exit_process),
            text_only: false,
        }
    }

    /// Capture from `source` instead of the default microphone
    #[must_use]
    pub fn audio_source(mut self, source: Arc<dyn AudioSource>) -> Self {
        self.source = source;
        self
    }

    /// Build engines with `factory`, now and on every reload
    #[must_use]
    pub fn engine_factory(mut self, factory: EngineFactory) -> Self {
        self.engine_factory = factory;
        self
    }

    /// Start integration processes through `runner`
    #[must_use]
    pub fn process_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Run `hook` on exit commands instead of ending the process
    #[must_use]
    pub fn on_exit(mut self, hook: ExitHook) -> Self {
        self.on_exit = hook;
        self
    }

    /// Ignore the microphone regardless of configuration
    #[must_use]
    pub const fn text_only(mut self, text_only: bool) -> Self {
        self.text_only = text_only;
        self
    }

    /// Build the assistant and the receiver of unclaimed text commands
    #[must_use]
    pub fn build(self) -> (Arc<Assistant>, mpsc::UnboundedReceiver<String>) {
        let settings = self.config.snapshot();
        let engines = (self.engine_factory)(&settings);
        let integrations =
            IntegrationRegistry::new(build_integrations(&settings, &self.runner));
        let (input, commands) = InputRouter::new();

        let assistant = Assistant {
            config: self.config,
            engines: ArcSwap::from_pointee(engines),
            engine_factory: self.engine_factory,
            integrations,
            runner: self.runner,
            recorder: Arc::new(UtteranceRecorder::new(self.source)),
            state: Mutex::new(StateMachine::new()),
            listening: ListeningFlag::default(),
            memory: Mutex::new(ConversationMemory::new()),
            sink: self.sink,
            input,
            on_exit: self.on_exit,
            text_only: self.text_only,
        };

        (Arc::new(assistant), commands)
    }
}

/// The running assistant
pub struct Assistant {
    config: Arc<ConfigStore>,
    engines: ArcSwap<Engines>,
    engine_factory: EngineFactory,
    integrations: IntegrationRegistry,
    runner: Arc<dyn ProcessRunner>,
    recorder: Arc<UtteranceRecorder>,
    state: Mutex<StateMachine>,
    listening: ListeningFlag,
    memory: Mutex<ConversationMemory>,
    sink: Arc<dyn PresentationSink>,
    input: InputRouter,
    on_exit: ExitHook,
    text_only: bool,
}

/// Leaves Busy when dropped
struct BusyGuard<'a> {
    state: &'a Mutex<StateMachine>,
    _listening: PauseGuard,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish();
    }
}

/// Reports the microphone off when dropped
struct MicGuard<'a>(&'a dyn PresentationSink);

impl<'a> MicGuard<'a> {
    fn on(sink: &'a dyn PresentationSink) -> Self {
        sink.mic_status(true);
        Self(sink)
    }
}

impl Drop for MicGuard<'_> {
    fn drop(&mut self) {
        self.0.mic_status(false);
    }
}

impl Assistant {
    /// Current interaction state
    #[must_use]
    pub fn state(&self) -> AssistantState {
        self.lock_state().state()
    }

    /// The listening flag
    #[must_use]
    pub const fn listening(&self) -> &ListeningFlag {
        &self.listening
    }

    /// The text input router
    #[must_use]
    pub const fn input(&self) -> &InputRouter {
        &self.input
    }

    /// The config store
    #[must_use]
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// The presentation sink
    #[must_use]
    pub fn sink(&self) -> &dyn PresentationSink {
        self.sink.as_ref()
    }

    /// Number of remembered exchanges
    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.lock_memory().len()
    }

    /// Whether the microphone should be used with `settings`
    #[must_use]
    pub const fn voice_enabled(&self, settings: &Settings) -> bool {
        !self.text_only && settings.voice_input_enabled
    }

    /// Post the startup status to the sink
    pub fn announce_startup(&self) {
        let settings = self.config.snapshot();
        self.sink
            .message(Sender::System, "Jarvis iniciado correctamente.");
        self.publish_engine_info();
        self.publish_memory_info(&settings);

        let wake = settings
            .wake_words
            .first()
            .map_or("Jarvis", String::as_str);
        self.sink.message(
            Sender::System,
            &format!("Jarvis listo. Di '{wake}' o escribe un comando."),
        );
        if !self.voice_enabled(&settings) {
            self.sink.message(
                Sender::System,
                "Modo solo texto activado (entrada de voz desactivada).",
            );
        }
    }

    /// Handle a typed line that was not claimed as a reply
    pub async fn submit_text(self: &Arc<Self>, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.exit_requested(&text) {
            return;
        }

        self.sink.message(Sender::User, &text);
        let rules = CommandRules::from_settings(&self.config.snapshot());
        let transition = self.lock_state().on_text(&text, &rules);
        self.follow(transition, Origin::Text).await;
    }

    /// Handle a transcribed voice utterance
    pub async fn handle_utterance(self: &Arc<Self>, utterance: Utterance) {
        if self.exit_requested(utterance.as_str()) {
            return;
        }

        let rules = CommandRules::from_settings(&self.config.snapshot());
        let transition = self
            .lock_state()
            .on_utterance(utterance.as_str(), &rules, Instant::now());

        if transition == Transition::Armed {
            self.sink.message(Sender::Jarvis, ARMED_PROMPT);
            let engines = self.engines.load_full();
            engines.speaker.speak(ARMED_PROMPT).await;
            self.await_command_window().await;
        } else {
            self.follow(transition, Origin::Voice).await;
        }
    }

    /// Keep collecting replies until the armed window yields a command or closes
    ///
    /// While listening is paused the window waits, and the paused time is added
    /// back to its deadline.
    async fn await_command_window(self: &Arc<Self>) {
        loop {
            let AssistantState::Armed { deadline } = self.state() else {
                return;
            };

            if !self.listening.is_listening() {
                let paused = self.wait_while_paused().await;
                tracing::debug!(paused_ms = paused.as_millis(), "command window resumed");
                self.lock_state().extend_window(paused);
                continue;
            }

            let now = Instant::now();
            if self.lock_state().expire(now) {
                self.sink
                    .message(Sender::Debug, "Ventana de comando cerrada.");
                return;
            }
            let remaining = deadline.saturating_duration_since(now);

            // a question is pending elsewhere; its reply is not ours to take
            let Some(claim) = self.input.try_claim() else {
                tokio::time::sleep(IDLE_POLL.min(remaining)).await;
                continue;
            };
            let reply = tokio::select! {
                reply = self.race_reply(claim, remaining, Listener::CommandWindow) => reply,
                () = self.until_paused() => continue,
            };
            let Some(reply) = reply else {
                continue;
            };

            if self.exit_requested(reply.text()) {
                return;
            }

            let rules = CommandRules::from_settings(&self.config.snapshot());
            let (transition, origin) = match &reply {
                Reply::Voice(u) => (
                    self.lock_state()
                        .on_utterance(u.as_str(), &rules, Instant::now()),
                    Origin::Voice,
                ),
                Reply::Text(t) => {
                    self.sink.message(Sender::User, t);
                    (self.lock_state().on_text(t, &rules), Origin::Text)
                }
            };

            match transition {
                Transition::Armed => {}
                Transition::Command(_) => {
                    self.follow(transition, origin).await;
                    return;
                }
                Transition::Ignored(_) => self.follow(transition, origin).await,
            }
        }
    }

    /// Sleep until some pause is held
    async fn until_paused(&self) {
        while self.listening.is_listening() {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Sleep until no pause is held; returns how long that took
    async fn wait_while_paused(&self) -> Duration {
        let started = Instant::now();
        while !self.listening.is_listening() {
            tokio::time::sleep(IDLE_POLL).await;
        }
        started.elapsed()
    }

    /// Act on a state transition
    async fn follow(self: &Arc<Self>, transition: Transition, origin: Origin) {
        match transition {
            Transition::Command(command) => self.run_busy(command, origin).await,
            Transition::Armed => {}
            Transition::Ignored(IgnoreReason::NoWakePhrase) => {
                tracing::trace!("no wake phrase, ignoring utterance");
            }
            Transition::Ignored(IgnoreReason::Busy) => {
                tracing::debug!(%origin, "busy, ignoring input");
                if origin == Origin::Text {
                    self.sink.message(
                        Sender::System,
                        "Estoy procesando otro comando, inténtalo en un momento.",
                    );
                }
            }
            Transition::Ignored(IgnoreReason::Rejected(reason)) => {
                let text = match reason {
                    Rejection::Noise(phrase) => format!("Comando filtrado como ruido ({phrase})."),
                    Rejection::Empty | Rejection::TooShort => {
                        "Comando muy corto, ignorado.".to_string()
                    }
                };
                self.sink.message(Sender::System, &text);
            }
        }
    }

    /// Resolve a command inside the Busy boundary
    async fn run_busy(self: &Arc<Self>, command: String, origin: Origin) {
        let _busy = BusyGuard {
            state: &self.state,
            _listening: self.listening.pause(),
        };

        tracing::info!(command, %origin, "processing command");
        let outcome = AssertUnwindSafe(self.process(&command, origin))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let reason = panic_message(panic.as_ref());
            tracing::error!(command, reason, "command processing panicked");
            self.sink
                .error(&format!("No se pudo procesar el comando: {reason}"));
        }
    }

    async fn process(&self, command: &str, origin: Origin) {
        let settings = self.config.snapshot();
        let engines = self.engines.load_full();
        let integrations = self.integrations.snapshot();
        let context = self.lock_memory().context();

        self.sink.message(
            Sender::Debug,
            &format!("Procesando comando: '{command}' ({origin})"),
        );

        let resolution = resolve(command, &context, &integrations, engines.backend.as_ref()).await;

        if resolution.source == ResponseSource::Fallback {
            self.sink.message(Sender::System, NO_RESPONSE);
        } else {
            self.sink.message(Sender::Jarvis, &resolution.response);
            if origin == Origin::Voice {
                engines.speaker.speak(&resolution.response).await;
            }
            self.lock_memory().record(command, &resolution.response);
        }

        tracing::debug!(source = ?resolution.source, "command resolved");
        self.publish_memory_info(&settings);
    }

    /// Record and transcribe one utterance
    ///
    /// Returns `None` when nothing usable was heard.
    pub async fn listen_once(&self, settings: &Settings) -> Option<Utterance> {
        let format = capture_format(settings);
        let params = RecordingParams::from_settings(settings);

        let recording = {
            let _mic = MicGuard::on(self.sink.as_ref());
            self.recorder.record_async(format, params).await?
        };

        let engines = self.engines.load_full();
        let Some(transcriber) = engines.transcriber.as_deref() else {
            tracing::debug!("no transcriber configured, discarding recording");
            return None;
        };

        let filter = TranscriptFilter::from_settings(settings);
        let utterance = transcribe_recording(transcriber, &recording, &filter).await?;
        self.sink
            .message(Sender::Debug, &format!("Texto reconocido: '{utterance}'"));
        Some(utterance)
    }

    /// Record until something usable is heard
    ///
    /// The command window gives up as soon as listening is paused; a question
    /// keeps listening since it is what holds the pause.
    async fn next_voice_reply(&self, listener: Listener) -> Option<Utterance> {
        let paused = || listener == Listener::CommandWindow && !self.listening.is_listening();
        loop {
            let settings = self.config.snapshot();
            if !self.voice_enabled(&settings) || paused() {
                return None;
            }
            let heard = self.listen_once(&settings).await;
            if paused() {
                tracing::debug!(heard = heard.is_some(), "listening paused mid-recording, discarding");
                return None;
            }
            if let Some(utterance) = heard {
                return Some(utterance);
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Wait for the first reply on either channel
    async fn race_reply(
        self: &Arc<Self>,
        claim: ReplyClaim,
        timeout: Duration,
        listener: Listener,
    ) -> Option<Reply> {
        let mut arms: Vec<BoxFuture<'_, Option<Reply>>> =
            vec![async move { claim.recv().await.map(Reply::Text) }.boxed()];

        if self.voice_enabled(&self.config.snapshot()) {
            arms.push(
                async move { self.next_voice_reply(listener).await.map(Reply::Voice) }.boxed(),
            );
        }

        first_reply(arms, timeout).await
    }

    /// Show and speak `question`, then wait for a reply on either channel
    pub async fn ask(self: &Arc<Self>, question: &str, timeout: Duration) -> Option<Reply> {
        // claim before speaking so a fast typist is not routed to the command path
        let claim = self.input.claim();
        self.sink.message(Sender::Jarvis, question);
        if self.voice_enabled(&self.config.snapshot()) {
            let engines = self.engines.load_full();
            engines.speaker.speak(question).await;
        }

        let reply = self.race_reply(claim, timeout, Listener::Question).await;
        if let Some(reply) = &reply {
            self.sink.message(Sender::User, reply.text());
        }
        reply
    }

    /// Rebuild engines and integrations from `settings` and republish them
    pub fn apply_config_changes(&self, settings: &Settings) {
        self.engines.store(Arc::new((self.engine_factory)(settings)));
        self.integrations
            .replace(build_integrations(settings, &self.runner));
        self.publish_engine_info();
        tracing::info!("configuration changes applied");
    }

    /// Run the voice loop forever
    pub async fn run_voice_loop(self: Arc<Self>) {
        tracing::info!("voice loop started");
        loop {
            let settings = self.config.snapshot();
            if !self.voice_enabled(&settings) || !self.listening.is_listening() {
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }

            let Some(utterance) = self.listen_once(&settings).await else {
                continue;
            };

            if !self.listening.is_listening() {
                tracing::debug!(text = %utterance, "listening paused mid-recording, discarding");
                continue;
            }
            self.handle_utterance(utterance).await;
        }
    }

    /// Run the text command loop until the input side closes
    pub async fn run_text_commands(self: Arc<Self>, mut commands: mpsc::UnboundedReceiver<String>) {
        while let Some(line) = commands.recv().await {
            self.submit_text(line).await;
        }
        tracing::debug!("text command loop finished");
    }

    /// Shut integrations down
    pub fn shutdown(&self) {
        self.integrations.shutdown_all();
    }

    fn exit_requested(&self, text: &str) -> bool {
        if !is_exit_command(text) {
            return false;
        }
        tracing::info!("exit command received");
        self.sink.message(Sender::System, "Hasta luego.");
        self.shutdown();
        (self.on_exit)();
        true
    }

    fn publish_engine_info(&self) {
        let engines = self.engines.load();
        let stt = engines
            .transcriber
            .as_ref()
            .map_or("none", |t| t.name());
        for (kind, name) in [
            (EngineKind::Tts, engines.speaker.name()),
            (EngineKind::Ai, engines.backend.name()),
            (EngineKind::Stt, stt),
        ] {
            self.sink.notify(UiEvent::EngineInfo {
                kind,
                name: name.to_string(),
            });
        }
        self.sink.notify(UiEvent::IntegrationsList {
            integrations: self.integrations.describe(),
        });
    }

    fn publish_memory_info(&self, settings: &Settings) {
        self.sink.notify(UiEvent::MemoryInfo {
            entries: self.memory_len(),
            corrections: settings.corrections.len(),
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, StateMachine> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_memory(&self) -> MutexGuard<'_, ConversationMemory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn exit_process() {
    std::process::exit(0);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown error".to_string())
}
