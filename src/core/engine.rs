//! Engine context - owns the window and every analysis component

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Local, Timelike};
use tracing::{debug, info, warn};

use super::{EventBus, SystemState};
use crate::analysis::{
    points_from_window, AnomalyBand, AnomalyScore, AnomalyScorer, Baseline, Cluster, ClusterEngine,
    ForecastEngine, ForecastResult, ScoreHistory, WindowSummary,
};
use crate::config::Config;
use crate::detection::{AlertConfigHandle, AlertConfigUpdate, AlertEvaluator, AlertEvent, AlertThresholds};
use crate::error::{EngineError, EngineResult};
use crate::telemetry::{SlidingWindowBuffer, TelemetrySample};

/// Clears the refresh flag when the job or its outcome is dropped
#[derive(Debug)]
struct RefreshGuard(Arc<AtomicBool>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A baseline refresh taken off the engine lock
#[derive(Debug)]
pub struct BaselineRefresh {
    samples: Vec<TelemetrySample>,
    guard: RefreshGuard,
}

impl BaselineRefresh {
    /// Fits the baseline. Safe to call from a blocking task.
    pub fn run(self) -> RefreshOutcome {
        let result = Baseline::fit(&self.samples);
        RefreshOutcome {
            result,
            _guard: self.guard,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Result of a finished refresh, handed back to the engine
#[derive(Debug)]
pub struct RefreshOutcome {
    result: EngineResult<Baseline>,
    _guard: RefreshGuard,
}

/// Streaming analytics engine
pub struct Engine {
    config: Arc<Config>,
    window: SlidingWindowBuffer,
    evaluator: AlertEvaluator,
    clusterer: ClusterEngine,
    scorer: AnomalyScorer,
    forecaster: ForecastEngine,
    history: ScoreHistory,
    refreshing: Arc<AtomicBool>,
    event_bus: Option<Arc<EventBus>>,
    state: SystemState,
    start_time: Option<Instant>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let window = SlidingWindowBuffer::new(config.window.max_data_points)?;
        let evaluator = AlertEvaluator::new(AlertConfigHandle::new(config.alerts));
        let clusterer =
            ClusterEngine::new(config.analysis.cluster_seed).with_min_points(config.analysis.min_cluster_points);
        let forecaster = ForecastEngine::new(&config.analysis);
        let history = ScoreHistory::new(config.window.max_data_points);

        Ok(Self {
            config,
            window,
            evaluator,
            clusterer,
            scorer: AnomalyScorer::new(),
            forecaster,
            history,
            refreshing: Arc::new(AtomicBool::new(false)),
            event_bus: None,
            state: SystemState::default(),
            start_time: None,
        })
    }

    /// Publishes samples, alerts and results on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn start(&mut self) {
        info!("Starting {} engine...", self.config.app_name);
        self.start_time = Some(Instant::now());
        self.state.running = true;
        self.emit_info("Monitoring system started");
    }

    pub fn stop(&mut self) {
        self.state.running = false;
        info!(
            "{} engine stopped after {} samples, {} alerts",
            self.config.app_name, self.state.total_samples, self.state.total_alerts
        );
    }

    /// Appends a sample to the window and runs the threshold rules on it
    pub fn ingest(&mut self, sample: TelemetrySample) -> Vec<AlertEvent> {
        let sample = sample.normalized();
        let alerts = self.evaluator.evaluate(&sample);

        if let Some(bus) = &self.event_bus {
            bus.publish_sample(sample.clone());
            for alert in &alerts {
                bus.publish_alert(alert.clone());
            }
        }

        if let Some(evicted) = self.window.append(sample) {
            debug!("Evicted sample from {}", evicted.timestamp);
        }

        self.state.total_samples += 1;
        self.state.total_alerts += alerts.len() as u64;
        alerts
    }

    pub fn window(&self) -> &SlidingWindowBuffer {
        &self.window
    }

    pub fn window_snapshot(&self) -> Vec<TelemetrySample> {
        self.window.snapshot()
    }

    pub fn run_clustering(&mut self, k: usize) -> EngineResult<Vec<Cluster>> {
        let points = points_from_window(self.window.iter());
        let clusters = self.clusterer.cluster(&points, k).map_err(|e| {
            self.state.failed_operations += 1;
            e
        })?;

        info!("Clustering analysis updated: {} groups over {} points", clusters.len(), points.len());
        if let Some(bus) = &self.event_bus {
            bus.publish_clusters(clusters.clone());
        }
        self.emit_info("Clustering analysis updated");
        Ok(clusters)
    }

    /// Scores the newest sample against the current baseline
    pub fn run_anomaly_check(&mut self) -> EngineResult<AnomalyScore> {
        let latest = self
            .window
            .latest()
            .ok_or(EngineError::InsufficientData { needed: 1, available: 0 })?;

        let value = match self.scorer.score_latest(self.window.iter(), latest) {
            Ok(value) => value,
            Err(e) => {
                self.state.failed_operations += 1;
                return Err(e);
            }
        };

        let analysis = &self.config.analysis;
        let score = AnomalyScore {
            value,
            sample_timestamp: latest.timestamp,
            band: AnomalyBand::classify(value, analysis.irregular_threshold, analysis.anomaly_threshold),
        };

        match score.band {
            AnomalyBand::Anomalous => {
                warn!("Anomaly score {:.3} for sample at {}: {}", value, score.sample_timestamp, score.band.description());
                self.state.anomalies_detected += 1;
                self.state.last_anomaly = Some(score.sample_timestamp);
            }
            AnomalyBand::Irregular => info!("Anomaly score {:.3}: {}", value, score.band.description()),
            AnomalyBand::Normal => debug!("Anomaly score {:.3}", value),
        }

        self.state.anomaly_checks += 1;
        self.history.push(score);
        if let Some(bus) = &self.event_bus {
            bus.publish_score(score);
        }
        Ok(score)
    }

    /// Forecast using the local wall-clock hour for the circadian horizon
    pub fn run_forecast(&mut self) -> EngineResult<ForecastResult> {
        self.run_forecast_at(Local::now().hour())
    }

    pub fn run_forecast_at(&mut self, hour: u32) -> EngineResult<ForecastResult> {
        let samples = self.window.snapshot();
        let forecast = self
            .forecaster
            .forecast(&samples, hour)
            .map_err(|e| {
                self.state.failed_operations += 1;
                e
            })?;

        match &forecast.behavior {
            Some(outlook) => {
                let [short, medium, long] = outlook.horizons();
                debug!(
                    "Forecast: {} / {} / {}, temperature path {:?}",
                    short, medium, long, forecast.temperature_path
                );
            }
            None => debug!("Forecast: temperature path {:?}", forecast.temperature_path),
        }

        self.state.forecasts += 1;
        if let Some(bus) = &self.event_bus {
            bus.publish_forecast(forecast.clone());
        }
        Ok(forecast)
    }

    /// Shared handle to the live thresholds
    pub fn alert_config(&self) -> AlertConfigHandle {
        self.evaluator.config().clone()
    }

    pub fn update_alert_config(&self, update: AlertConfigUpdate) -> EngineResult<AlertThresholds> {
        if update.is_empty() {
            return Ok(self.evaluator.config().get());
        }

        let thresholds = self.evaluator.config().update(update)?;
        self.emit_info("Alert configuration updated");
        Ok(thresholds)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Claims the refresh flag and snapshots the window.
    ///
    /// Returns `None` while another refresh holds the flag.
    pub fn begin_baseline_refresh(&self) -> Option<BaselineRefresh> {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(BaselineRefresh {
            samples: self.window.snapshot(),
            guard: RefreshGuard(Arc::clone(&self.refreshing)),
        })
    }

    pub fn finish_baseline_refresh(&mut self, outcome: RefreshOutcome) -> EngineResult<()> {
        let RefreshOutcome { result, _guard } = outcome;

        match result {
            Ok(baseline) => {
                info!("Baseline refreshed from {} samples", baseline.sample_count());
                self.scorer.install(baseline);
                self.state.baseline_refreshes += 1;
                Ok(())
            }
            Err(e) => {
                self.state.failed_operations += 1;
                Err(e)
            }
        }
    }

    /// Refreshes the baseline inline. `Ok(false)` when one is already running.
    pub fn refresh_baseline(&mut self) -> EngineResult<bool> {
        match self.begin_baseline_refresh() {
            Some(job) => {
                let outcome = job.run();
                self.finish_baseline_refresh(outcome)?;
                Ok(true)
            }
            None => {
                debug!("Baseline refresh already in progress");
                Ok(false)
            }
        }
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.scorer.baseline()
    }

    pub fn score_history(&self) -> Vec<AnomalyScore> {
        self.history.to_vec()
    }

    pub fn summary(&self) -> WindowSummary {
        WindowSummary::from_samples(&self.window.snapshot())
    }

    pub fn state(&self) -> SystemState {
        let mut state = self.state.clone();
        state.uptime_seconds = self.uptime();
        state
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    fn emit_info(&self, message: &str) {
        if let Some(bus) = &self.event_bus {
            bus.publish_alert(AlertEvent::info(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::AlertKind;

    fn engine() -> Engine {
        let mut config = Config::default();
        config.analysis.cluster_seed = Some(7);
        Engine::new(config).unwrap()
    }

    fn steady(id: i64) -> TelemetrySample {
        TelemetrySample::new(id, [10.0, 0.4, 0.3], [-0.09, -0.01, -0.02], 23.0, 3.9)
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut config = Config::default();
        config.window.max_data_points = 5;
        let mut engine = Engine::new(config).unwrap();

        for i in 0..12 {
            engine.ingest(steady(i));
            assert!(engine.window().len() <= 5);
        }

        let ids: Vec<i64> = engine.window_snapshot().iter().map(|s| s.sensor_id).collect();
        assert_eq!(ids, vec![7, 8, 9, 10, 11]);
        assert_eq!(engine.state().total_samples, 12);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = Config::default();
        config.window.max_data_points = 0;
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_ingest_returns_alerts() {
        let mut engine = engine();
        let alerts = engine.ingest(TelemetrySample::new(1, [0.0; 3], [0.0; 3], 31.0, 3.0));

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Warning);
        assert_eq!(engine.state().total_alerts, 1);
    }

    #[test]
    fn test_clustering_identical_points() {
        let mut engine = engine();
        for i in 0..5 {
            engine.ingest(steady(i));
        }

        let clusters = engine.run_clustering(3).unwrap();
        let non_empty: Vec<_> = clusters.iter().filter(|c| !c.is_empty()).collect();
        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].label, "Cluster 1");
        assert_eq!(non_empty[0].len(), 5);
    }

    #[test]
    fn test_clustering_failure_keeps_engine_usable() {
        let mut engine = engine();
        engine.ingest(steady(0));

        assert_eq!(
            engine.run_clustering(3).unwrap_err(),
            EngineError::InsufficientData { needed: 5, available: 1 }
        );
        assert_eq!(engine.run_clustering(0).unwrap_err(), EngineError::InvalidClusterCount(0));

        engine.ingest(steady(1));
        assert_eq!(engine.window().len(), 2);
        assert_eq!(engine.state().failed_operations, 2);
    }

    #[test]
    fn test_anomaly_check_on_steady_window() {
        let mut engine = engine();
        assert!(engine.run_anomaly_check().is_err());

        for i in 0..10 {
            engine.ingest(steady(i));
        }

        let score = engine.run_anomaly_check().unwrap();
        assert!(score.value.abs() < 1e-12);
        assert_eq!(score.band, AnomalyBand::Normal);
        assert_eq!(engine.score_history().len(), 1);
    }

    #[test]
    fn test_anomaly_check_uses_refreshed_baseline() {
        let mut engine = engine();
        for i in 0..10 {
            engine.ingest(steady(i));
        }
        assert!(engine.refresh_baseline().unwrap());

        let probe = TelemetrySample::new(10, [30.0, 0.4, 0.3], [-0.09, -0.01, -0.02], 23.0, 3.9);
        engine.ingest(probe);

        let score = engine.run_anomaly_check().unwrap();
        assert!((score.value - 400.0 / 6.0).abs() < 1e-9);
        assert_eq!(score.band, AnomalyBand::Anomalous);
        assert_eq!(engine.state().anomalies_detected, 1);
    }

    #[test]
    fn test_forecast_from_rising_temperatures() {
        let mut engine = engine();
        for (i, t) in (20..30).enumerate() {
            engine.ingest(TelemetrySample::new(i as i64, [10.0, 0.4, 0.3], [0.0; 3], t as f64, 3.9));
        }

        let forecast = engine.run_forecast_at(12).unwrap();
        assert_eq!(forecast.temperature_path, vec![30.0, 31.0, 32.0, 33.0, 34.0, 35.0]);
        assert_eq!(forecast.behavior.unwrap().long_term.to_string(), "active grazing");
        assert_eq!(engine.state().forecasts, 1);
    }

    #[test]
    fn test_non_finite_fields_dropped_on_ingest() {
        let mut engine = engine();
        for i in 0..10 {
            engine.ingest(steady(i));
        }

        let mut broken = steady(10);
        broken.accel.x = Some(f64::NAN);
        broken.temperature_c = Some(f64::INFINITY);
        let alerts = engine.ingest(broken);
        assert!(alerts.is_empty());

        let stored = engine.window().latest().unwrap();
        assert_eq!(stored.accel.x, None);
        assert_eq!(stored.temperature_c, None);

        // The latest sample is no longer scorable, so the check reports it
        // instead of producing a non-finite score.
        assert_eq!(
            engine.run_anomaly_check().unwrap_err(),
            EngineError::IncompleteSample { field: "accel_x" }
        );
        assert!(engine.score_history().iter().all(|s| s.value.is_finite()));

        engine.ingest(steady(11));
        let score = engine.run_anomaly_check().unwrap();
        assert!(score.value.is_finite() && score.value >= 0.0);

        let forecast = engine.run_forecast_at(12).unwrap();
        assert!(forecast.temperature_path.iter().all(|t| t.is_finite()));
    }

    #[test]
    fn test_forecast_needs_history() {
        let mut engine = engine();
        engine.ingest(steady(0));

        assert_eq!(
            engine.run_forecast_at(3).unwrap_err(),
            EngineError::InsufficientHistory { needed: 2, available: 1 }
        );
    }

    #[test]
    fn test_rejected_alert_update_keeps_previous() {
        let engine = engine();
        let err = engine
            .update_alert_config(AlertConfigUpdate {
                temp_max: Some(-5.0),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(err, EngineError::ConfigOutOfRange { field: "temp_max", value: -5.0 });
        assert_eq!(engine.alert_config().get().temp_max, 30.0);
    }

    #[test]
    fn test_refresh_while_running_is_noop() {
        let mut engine = engine();
        for i in 0..10 {
            engine.ingest(steady(i));
        }

        let job = engine.begin_baseline_refresh().unwrap();
        assert!(engine.is_refreshing());
        assert!(engine.begin_baseline_refresh().is_none());
        assert!(!engine.refresh_baseline().unwrap());

        engine.finish_baseline_refresh(job.run()).unwrap();
        assert!(!engine.is_refreshing());
        assert!(engine.baseline().is_some());
        assert!(engine.refresh_baseline().unwrap());
        assert_eq!(engine.state().baseline_refreshes, 2);
    }

    #[test]
    fn test_failed_refresh_clears_flag() {
        let mut engine = engine();
        let err = engine.refresh_baseline().unwrap_err();

        assert_eq!(err, EngineError::InsufficientData { needed: 1, available: 0 });
        assert!(!engine.is_refreshing());
        assert!(engine.baseline().is_none());

        let job = engine.begin_baseline_refresh().unwrap();
        drop(job);
        assert!(!engine.is_refreshing());
    }

    #[tokio::test]
    async fn test_info_events_published() {
        let bus = Arc::new(EventBus::new(64));
        let mut alerts = bus.subscribe_alerts();
        let mut engine = engine().with_event_bus(Arc::clone(&bus));

        engine.start();
        engine
            .update_alert_config(AlertConfigUpdate {
                battery_min: Some(3.2),
                ..Default::default()
            })
            .unwrap();
        for i in 0..5 {
            engine.ingest(steady(i));
        }
        engine.run_clustering(2).unwrap();

        let mut messages = Vec::new();
        while let Ok(alert) = alerts.try_recv() {
            assert_eq!(alert.kind, AlertKind::Info);
            messages.push(alert.message);
        }
        assert_eq!(
            messages,
            vec![
                "Monitoring system started",
                "Alert configuration updated",
                "Clustering analysis updated"
            ]
        );
        assert!(engine.state().running);
    }
}
