// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Tick scheduler driving ingestion and analysis

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{Engine, EventBus};
use crate::config::SchedulerConfig;
use crate::detection::AlertKind;
use crate::telemetry::TelemetrySource;

/// Counters returned when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub ingest_ticks: u64,
    pub analysis_ticks: u64,
    pub source_exhausted: bool,
}

pub struct Scheduler {
    config: SchedulerConfig,
    max_ticks: Option<u64>,
    event_bus: Option<Arc<EventBus>>,
}

impl Scheduler {
    /// Zero cadences are treated as every tick.
    pub fn new(mut config: SchedulerConfig) -> Self {
        config.forecast_every_ticks = config.forecast_every_ticks.max(1);
        config.refresh_every_ticks = config.refresh_every_ticks.max(1);
        Self {
            config,
            max_ticks: None,
            event_bus: None,
        }
    }

    /// Stop after this many ingestion ticks
    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Tick failures are published as error events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Runs until shutdown, `max_ticks` or the source running dry.
    ///
    /// A closed shutdown channel counts as a shutdown signal.
    pub async fn run<S>(
        &self,
        engine: Arc<Mutex<Engine>>,
        source: &mut S,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<SchedulerReport>
    where
        S: TelemetrySource + ?Sized,
    {
        let period = Duration::from_millis(self.config.update_interval_ms.max(1));
        let mut ingest_timer = interval(period);
        ingest_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut analysis_timer = interval_at(Instant::now() + period / 2, period);
        analysis_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = SchedulerReport::default();
        info!("Scheduler started: source '{}', period {:?}", source.id(), period);

        loop {
            tokio::select! {
                _ = ingest_timer.tick() => {
                    if !self.ingest_tick(&engine, source).await {
                        report.source_exhausted = true;
                        info!("Source '{}' exhausted", source.id());
                        break;
                    }
                    report.ingest_ticks += 1;
                    if self.max_ticks.is_some_and(|max| report.ingest_ticks >= max) {
                        debug!("Reached {} ingestion ticks", report.ingest_ticks);
                        break;
                    }
                }
                _ = analysis_timer.tick() => {
                    report.analysis_ticks += 1;
                    self.analysis_tick(&engine, report.analysis_ticks);
                }
                _ = shutdown.recv() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }

        info!(
            "Scheduler stopped after {} ingestion and {} analysis ticks",
            report.ingest_ticks, report.analysis_ticks
        );
        Ok(report)
    }

    /// Pulls one sample into the engine. `false` once the source is dry.
    async fn ingest_tick<S>(&self, engine: &Arc<Mutex<Engine>>, source: &mut S) -> bool
    where
        S: TelemetrySource + ?Sized,
    {
        let sample = match source.next_sample().await {
            Ok(Some(sample)) => sample,
            Ok(None) => return false,
            Err(e) => {
                self.report_failure(&format!("Source '{}' failed: {:#}", source.id(), e));
                return true;
            }
        };

        let alerts = engine.lock().ingest(sample);
        for alert in alerts {
            match alert.kind {
                AlertKind::Danger => error!("{}", alert.message),
                AlertKind::Warning => warn!("{}", alert.message),
                AlertKind::Info => info!("{}", alert.message),
            }
        }
        true
    }

    /// Scores every tick, forecasts and refreshes on their cadences
    pub(crate) fn analysis_tick(&self, engine: &Arc<Mutex<Engine>>, tick: u64) {
        let mut guard = engine.lock();

        let available = guard.window().len();
        if available < self.config.min_analysis_samples {
            debug!(
                "Analysis tick {} idle: {} of {} samples",
                tick, available, self.config.min_analysis_samples
            );
            return;
        }
        if guard.is_refreshing() {
            debug!("Analysis tick {} skipped: baseline refresh in progress", tick);
            return;
        }

        if let Err(e) = guard.run_anomaly_check() {
            self.report_failure(&format!("Anomaly check failed: {}", e));
        }

        if tick % self.config.forecast_every_ticks == 0 {
            match guard.run_forecast() {
                Ok(_) => {
                    let summary = guard.summary();
                    info!(
                        "Window: {} samples, mean temp {:?}, mean activity {:?}, battery {:?}",
                        summary.count, summary.mean_temperature, summary.mean_activity, summary.latest_battery
                    );
                }
                Err(e) => self.report_failure(&format!("Forecast failed: {}", e)),
            }
        }

        if tick % self.config.refresh_every_ticks == 0 {
            let Some(job) = guard.begin_baseline_refresh() else {
                debug!("Baseline refresh already running, trigger ignored");
                return;
            };
            drop(guard);

            debug!("Refreshing baseline from {} samples", job.sample_count());
            let engine = Arc::clone(engine);
            let bus = self.event_bus.clone();
            tokio::spawn(async move {
                match tokio::task::spawn_blocking(move || job.run()).await {
                    Ok(outcome) => {
                        let finished = engine.lock().finish_baseline_refresh(outcome);
                        if let Err(e) = finished {
                            warn!("Baseline refresh failed: {}", e);
                            if let Some(bus) = bus {
                                bus.publish_error(&format!("Baseline refresh failed: {}", e));
                            }
                        }
                    }
                    Err(e) => error!("Baseline refresh task failed: {}", e),
                }
            });
        }
    }

    fn report_failure(&self, message: &str) {
        warn!("{}", message);
        if let Some(bus) = &self.event_bus {
            bus.publish_error(message);
        }
    }
}
