use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis_voice::config::file::resolve_config_path;
use jarvis_voice::dashboard::{DashboardOptions, run_dashboard, run_stdin};
use jarvis_voice::events::ChannelSink;
use jarvis_voice::voice::{AudioSource, MicrophoneSource, build_speaker, capture_format, energy};
use jarvis_voice::{AssistantBuilder, ConfigStore, ConfigWatcher};

/// Jarvis - voice and text assistant
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(short, long, env = "JARVIS_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Ignore the microphone and accept typed commands only
    #[arg(long, env = "JARVIS_TEXT_ONLY")]
    text_only: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Print a summary of the active configuration
    ShowConfig,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hola, esta es una prueba del sistema de voz.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,jarvis_voice=info",
        1 => "info,jarvis_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    // stdout belongs to the dashboard
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = resolve_config_path(cli.config);
    let store = Arc::new(ConfigStore::open(&path)?);

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::ShowConfig => {
                show_config(&store);
                Ok(())
            }
            Command::TestMic { duration } => test_mic(&store, duration).await,
            Command::TestTts { text } => test_tts(&store, &text).await,
        };
    }

    tracing::info!(
        config = %path.display(),
        text_only = cli.text_only,
        "starting jarvis"
    );

    let (sink, events) = ChannelSink::new();
    let (assistant, commands) = AssistantBuilder::new(Arc::clone(&store), Arc::new(sink))
        .text_only(cli.text_only)
        .build();

    tokio::spawn(run_dashboard(
        events,
        DashboardOptions {
            show_debug: cli.verbose > 0,
        },
    ));
    assistant.announce_startup();

    tokio::spawn(Arc::clone(&assistant).run_text_commands(commands));
    tokio::spawn(run_stdin(Arc::clone(&assistant)));
    tokio::spawn(ConfigWatcher::new(Arc::clone(&assistant)).run());
    tokio::spawn(Arc::clone(&assistant).run_voice_loop());

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupted, shutting down");
    assistant.shutdown();

    // a recording may still hold a blocking thread; do not wait for it
    std::process::exit(0);
}

fn show_config(store: &ConfigStore) {
    let settings = store.snapshot();
    println!("Config file: {}", store.path().display());
    println!("---");
    for line in settings.summary() {
        println!("{line}");
    }
}

/// Print a level meter for the configured input
async fn test_mic(store: &ConfigStore, duration: u64) -> anyhow::Result<()> {
    let settings = store.snapshot();
    let format = capture_format(&settings);
    let threshold = settings.volume_threshold;

    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");
    println!(
        "Sample rate: {} Hz, silence threshold: {threshold}",
        format.sample_rate
    );
    println!("---");

    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut stream = MicrophoneSource.open(&format)?;
        let second = Duration::from_secs(1);

        for i in 0..duration {
            let started = Instant::now();
            let mut samples = Vec::new();
            while started.elapsed() < second {
                samples.extend(stream.read_block()?);
            }

            let level = energy(&samples);
            let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let meter_len = (level * 100.0).min(50.0) as usize;
            let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);
            let marker = if level > threshold { "speech" } else { "silence" };

            println!(
                "[{:2}s] RMS: {level:.4} | Peak: {peak:5} | [{meter}] {marker}",
                i + 1
            );
        }
        Ok(())
    })
    .await??;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed below the threshold while speaking, lower volume_threshold.");

    Ok(())
}

/// Speak `text` through the configured TTS provider
async fn test_tts(store: &ConfigStore, text: &str) -> anyhow::Result<()> {
    let settings = store.snapshot();
    let speaker = build_speaker(&settings);

    if speaker.name() == "none" {
        println!("TTS is disabled (tts.provider = \"{}\")", settings.tts.provider);
        return Ok(());
    }

    println!("Speaking with {}: \"{text}\"", speaker.name());
    speaker.speak(text).await;
    println!("Done.");

    Ok(())
}
