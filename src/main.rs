// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! CollarWatch - headless collar telemetry monitor
//!
//! Replays a telemetry file (or a synthetic feed) through the analytics
//! engine, logging alerts, anomaly scores and forecasts as they happen.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use collarwatch::core::{Engine, EventBus, Scheduler};
use collarwatch::telemetry::{CsvSource, ReplaySource, SyntheticFeed, TelemetrySource};
use collarwatch::{Config, VERSION};

/// CollarWatch - livestock collar telemetry analytics
#[derive(Parser, Debug)]
#[command(name = "collarwatch")]
#[command(version = VERSION)]
#[command(about = "Streaming anomaly detection and forecasting for collar telemetry")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Telemetry file to replay before switching to a synthetic walk
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Print bus events to stdout as JSON lines
    #[arg(long)]
    json: bool,

    /// Tick period in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many ingestion ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Seed for the synthetic feed and cluster sampling
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("CollarWatch v{}", VERSION);
    info!("Configuration loaded from {:?}", config_path);

    // Override with command line args
    if let Some(csv) = args.csv.clone() {
        config.ingest.csv_path = Some(csv);
    }
    if let Some(interval_ms) = args.interval_ms {
        config.scheduler.update_interval_ms = interval_ms;
    }
    if let Some(seed) = args.seed {
        config.ingest.synthetic_seed = Some(seed);
        config.analysis.cluster_seed = Some(seed);
    }
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_headless(config, args.max_ticks, args.json))
}

async fn run_headless(config: Config, max_ticks: Option<u64>, json: bool) -> Result<()> {
    let bus = Arc::new(EventBus::default());

    let printer = if json {
        let mut events = bus.subscribe_events();
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("Failed to serialize event {}: {}", event.id, e),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => warn!("Event printer lagged by {} events", n),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    } else {
        None
    };

    let mut source: Box<dyn TelemetrySource> = match &config.ingest.csv_path {
        Some(path) => Box::new(ReplaySource::new(CsvSource::from_path(path)?, config.ingest.synthetic_seed)),
        None => {
            info!("No telemetry file configured, using synthetic feed");
            Box::new(SyntheticFeed::new(config.ingest.synthetic_seed))
        }
    };

    let scheduler = Scheduler::new(config.scheduler.clone())
        .with_max_ticks(max_ticks)
        .with_event_bus(Arc::clone(&bus));
    let preload = config.ingest.preload_samples;

    let mut engine = Engine::new(config)?.with_event_bus(Arc::clone(&bus));
    engine.start();

    for _ in 0..preload {
        match source.next_sample().await? {
            Some(sample) => {
                engine.ingest(sample);
            }
            None => break,
        }
    }
    info!("Preloaded {} samples from '{}'", engine.window().len(), source.id());

    let engine = Arc::new(Mutex::new(engine));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, cleaning up...");
            let _ = shutdown_tx.send(());
        }
    });

    info!("CollarWatch running, press Ctrl+C to shutdown");
    let report = scheduler.run(Arc::clone(&engine), source.as_mut(), shutdown_rx).await?;

    let state = {
        let mut engine = engine.lock();
        engine.stop();
        engine.state()
    };
    info!(
        "Processed {} samples over {} analysis ticks: {} alerts, {} anomalies, {} forecasts",
        state.total_samples, report.analysis_ticks, state.total_alerts, state.anomalies_detected, state.forecasts
    );

    drop(engine);
    drop(scheduler);
    drop(bus);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    info!("CollarWatch shutdown complete");
    Ok(())
}
