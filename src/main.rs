//! Pulse Sync CLI
//!
//! Streams live synchrony between two physiological channels to WebSocket viewers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pulse_sync::{
    broadcast::Broadcaster,
    config::Config,
    core::{
        windowed_series, CorrelationEngine, CorrelationMode, NeutralReason, ReplayCursor,
        ReplayDataset,
    },
    scheduler::{DataSource, SchedulerConfig, SchedulerHandle, StreamScheduler},
    sensor::{CompanionGenerator, LiveFeed, SensorKind, SimulatedConfig, SimulatedSensor},
    server::{self, ServerConfig},
    stats::create_shared_stats,
    SYNTHETIC_COMPANION_NOTICE, VERSION,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulse-sync")]
#[command(version = VERSION)]
#[command(about = "Live physiological synchrony streaming", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Connection and session overrides shared by the streaming commands.
#[derive(clap::Args)]
struct ServeArgs {
    /// Address to bind the frame server to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind the frame server to
    #[arg(long)]
    port: Option<u16>,

    /// Maximum session duration in seconds (0 for no limit)
    #[arg(long)]
    duration: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream from a live sensor (simulated when no device is attached)
    Live {
        /// Sensor kind (heart-rate or ecg)
        #[arg(long, default_value = "heart-rate")]
        kind: String,

        #[command(flatten)]
        serve: ServeArgs,
    },

    /// Replay a recorded two-channel dataset, one second per tick
    Replay {
        /// JSON dataset with sampling_rate, channel_a and optional channel_b
        file: PathBuf,

        #[command(flatten)]
        serve: ServeArgs,
    },

    /// Compute per-second synchrony over a whole dataset and print JSON lines
    Analyze {
        /// JSON dataset with sampling_rate, channel_a and optional channel_b
        file: PathBuf,

        /// Correlation mode (pearson or xcorr)
        #[arg(long, default_value = "pearson")]
        mode: String,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulse_sync=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Live { kind, serve } => cmd_live(&kind, serve).await,
        Commands::Replay { file, serve } => cmd_replay(file, serve).await,
        Commands::Analyze { file, mode } => cmd_analyze(file, &mode),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn cmd_live(kind: &str, serve: ServeArgs) -> anyhow::Result<()> {
    let kind = SensorKind::from_name(kind)
        .with_context(|| format!("unknown sensor kind '{kind}' (expected heart-rate or ecg)"))?;
    let mut config = load_config(&serve)?;
    config.sensor_kind = kind;

    println!("Pulse Sync v{VERSION}");
    println!("{SYNTHETIC_COMPANION_NOTICE}");

    let mut sensor_config = SimulatedConfig::for_kind(kind);
    sensor_config.seed = config.seed;
    let link = SimulatedSensor::new(sensor_config);

    let companion = CompanionGenerator::new(config.noise_std(), config.seed);
    let feed = LiveFeed::new(Box::new(link), kind, companion, config.ingest_queue);

    stream(config, DataSource::Live(feed), false).await
}

async fn cmd_replay(file: PathBuf, serve: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(&serve)?;
    let dataset = ReplayDataset::load(&file)
        .with_context(|| format!("failed to load dataset {}", file.display()))?;

    println!("Pulse Sync v{VERSION}");
    if dataset.channel_b.is_none() {
        println!("{SYNTHETIC_COMPANION_NOTICE}");
    }

    let mut companion = CompanionGenerator::new(config.noise_std(), config.seed);
    let cursor = ReplayCursor::from_dataset(dataset, &mut companion);
    println!(
        "Replaying {} second(s) of data from {}",
        cursor.remaining_slices(),
        file.display()
    );

    stream(config, DataSource::Replay(cursor), true).await
}

async fn stream(config: Config, source: DataSource, wait_for_viewer: bool) -> anyhow::Result<()> {
    let broadcaster = Arc::new(Broadcaster::new());
    let stats = create_shared_stats();

    let mut scheduler = StreamScheduler::new(
        SchedulerConfig::from(&config),
        broadcaster.clone(),
        stats.clone(),
    );
    scheduler.attach(source)?;
    let handle = scheduler.handle();
    ctrlc_handler(handle.clone())?;

    let server_config = ServerConfig::new(config.host.clone(), config.port, config.subscriber_queue);
    let (addr, shutdown_tx) =
        server::run(server_config, broadcaster.clone(), stats.clone(), Some(handle.clone())).await?;

    println!("Streaming frames on ws://{addr}/ws");
    println!("Press Ctrl+C to stop");
    println!();

    if wait_for_viewer {
        println!("Waiting for a viewer to connect...");
        while broadcaster.subscriber_count() == 0 && !handle.is_stop_requested() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    let reason = scheduler.run().await?;
    let _ = shutdown_tx.send(());

    println!();
    println!("Stream stopped: {reason}");
    println!("{}", stats.summary());
    Ok(())
}

/// One line of `analyze` output.
#[derive(Serialize)]
struct AnalysisLine {
    time: u64,
    correlation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    neutral: Option<NeutralReason>,
}

fn cmd_analyze(file: PathBuf, mode: &str) -> anyhow::Result<()> {
    let mode = CorrelationMode::from_name(mode)
        .with_context(|| format!("unknown mode '{mode}' (expected pearson or xcorr)"))?;
    let config = Config::load()?;
    let dataset = ReplayDataset::load(&file)
        .with_context(|| format!("failed to load dataset {}", file.display()))?;

    let window = dataset.sampling_rate;
    let mut companion = CompanionGenerator::new(config.noise_std(), config.seed);
    let (a, b) = dataset.into_channels(&mut companion);
    let engine = CorrelationEngine::new(config.min_samples);

    for entry in windowed_series(&a, &b, window, mode, &engine) {
        let line = AnalysisLine {
            time: entry.time,
            correlation: entry.correlation.value,
            neutral: entry.correlation.neutral_reason(),
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Load the config file and apply command-line overrides.
fn load_config(serve: &ServeArgs) -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    if let Some(host) = &serve.host {
        config.host = host.clone();
    }
    if let Some(port) = serve.port {
        config.port = port;
    }
    if let Some(secs) = serve.duration {
        config.session_duration = Duration::from_secs(secs);
    }
    config.validate()?;
    Ok(config)
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(handle: SchedulerHandle) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        handle.stop();
    })
    .context("Error setting Ctrl+C handler")
}
