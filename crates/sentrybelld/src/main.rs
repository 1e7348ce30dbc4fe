use anyhow::{Context, Result};
use clap::Parser;
use sentrybell_core::OnnxAnalyzer;
use sentrybell_hw::{CaptureLoop, LocalOpener, NetworkOpener, SourceOpener};
use sentrybell_remote::{HttpObjectStore, HttpRealtimeDb, RealtimeDb};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod gallery;
mod ledger;
mod pipeline;
mod signals;
#[cfg(test)]
mod testutil;

use config::Config;
use gallery::GallerySync;
use ledger::AttendanceLedger;
use pipeline::{LogSink, Pipeline};

#[derive(Parser)]
#[command(name = "sentrybelld", about = "Sentrybell visitor-recognition daemon")]
struct Cli {
    /// Camera source kind: 1 = local device, 2 = network stream.
    /// Prompts interactively when omitted.
    #[arg(long)]
    source: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    tracing::info!("sentrybelld starting");

    let source_kind = match cli.source {
        Some(kind) => kind,
        None => prompt_source_kind()?,
    };
    let opener: Box<dyn SourceOpener> = match source_kind {
        1 => Box::new(LocalOpener { device_path: config.local_device.clone() }),
        2 => Box::new(NetworkOpener {
            stream_url: config.stream_url.clone(),
            snapshot_url: config.snapshot_url.clone(),
        }),
        other => anyhow::bail!("unknown source kind {other} (expected 1 or 2)"),
    };

    let analyzer = OnnxAnalyzer::load(&config.detector_model_path(), &config.encoder_model_path())
        .context("failed to load face models")?;

    let store = HttpObjectStore::new(&config.storage_bucket)
        .context("failed to create object-storage client")?;
    let db: Arc<dyn RealtimeDb> = Arc::new(
        HttpRealtimeDb::new(&config.realtime_url)
            .context("failed to create realtime backend client")?,
    );
    let ledger = AttendanceLedger::open(&config.ledger_path)
        .with_context(|| format!("failed to open ledger {}", config.ledger_path.display()))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_rx = signals::spawn_signal_poller(
        db.clone(),
        Duration::from_secs(config.signal_poll_secs),
        shutdown.clone(),
    );

    let capture = CaptureLoop::new(
        opener,
        Duration::from_secs(config.read_backoff_secs),
        shutdown.clone(),
    );
    let sync = GallerySync::new(Box::new(store), &config.gallery_prefix);
    let pipeline = Pipeline::new(
        &config,
        Box::new(analyzer),
        sync,
        ledger,
        db,
        chrono::Utc::now(),
    );

    let pipeline_shutdown = shutdown.clone();
    let handle = std::thread::Builder::new()
        .name("sentrybell-pipeline".into())
        .spawn(move || pipeline.run(capture, signal_rx, pipeline_shutdown, Box::new(LogSink)))
        .context("failed to spawn pipeline thread")?;

    // Supervise: orderly shutdown on ctrl-c, and notice if the capture
    // context dies on its own (fatal source initialization).
    let mut liveness = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received; shutting down");
                break;
            }
            _ = liveness.tick() => {
                if handle.is_finished() {
                    tracing::warn!("pipeline thread ended");
                    break;
                }
            }
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    let _ = handle.join();
    tracing::info!("sentrybelld stopped");

    Ok(())
}

/// The one interactive prompt: pick the camera source kind.
fn prompt_source_kind() -> Result<u8> {
    print!("Select camera source (1 = local device, 2 = network stream): ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    line.trim()
        .parse::<u8>()
        .context("expected 1 or 2")
}
