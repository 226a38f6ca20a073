// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::{TemperatureClamp, DEFAULT_ANOMALY_THRESHOLD, DEFAULT_IRREGULAR_THRESHOLD, DEFAULT_MIN_POINTS};
use crate::detection::AlertThresholds;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level
    pub log_level: String,

    /// Sliding window configuration
    pub window: WindowConfig,

    /// Analysis configuration
    pub analysis: AnalysisConfig,

    /// Alert thresholds at startup
    pub alerts: AlertThresholds,

    /// Tick cadences
    pub scheduler: SchedulerConfig,

    /// Sample source configuration
    pub ingest: IngestConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "CollarWatch".to_string(),
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            analysis: AnalysisConfig::default(),
            alerts: AlertThresholds::default(),
            scheduler: SchedulerConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("collarwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.window.max_data_points == 0 {
            bail!("window.max_data_points must be greater than zero");
        }

        let a = &self.analysis;
        for (field, value) in [
            ("anomaly_threshold", a.anomaly_threshold),
            ("irregular_threshold", a.irregular_threshold),
            ("resting_below", a.resting_below),
            ("walking_below", a.walking_below),
        ] {
            if !value.is_finite() {
                bail!("analysis.{} must be a finite number, got {}", field, value);
            }
        }
        if a.clusters == 0 {
            bail!("analysis.clusters must be at least 1");
        }
        if a.regression_window < 2 {
            bail!("analysis.regression_window must be at least 2");
        }
        if !(a.temperature_clamp.min.is_finite() && a.temperature_clamp.max.is_finite())
            || a.temperature_clamp.min > a.temperature_clamp.max
        {
            bail!(
                "analysis.temperature_clamp is invalid: [{}, {}]",
                a.temperature_clamp.min,
                a.temperature_clamp.max
            );
        }
        if a.irregular_threshold > a.anomaly_threshold {
            bail!("analysis.irregular_threshold must not exceed analysis.anomaly_threshold");
        }
        if a.resting_below > a.walking_below {
            bail!("analysis.resting_below must not exceed analysis.walking_below");
        }
        if a.day_start_hour > 24 || a.day_end_hour > 24 || a.day_start_hour > a.day_end_hour {
            bail!("analysis day hours must satisfy 0 <= start <= end <= 24");
        }

        self.alerts.validate()?;

        let s = &self.scheduler;
        if s.update_interval_ms == 0 || s.forecast_every_ticks == 0 || s.refresh_every_ticks == 0 {
            bail!("scheduler intervals must be greater than zero");
        }

        Ok(())
    }
}

/// Sliding window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Samples retained for analysis
    pub max_data_points: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { max_data_points: 50 }
    }
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of clusters
    pub clusters: usize,

    /// Minimum points before clustering runs
    pub min_cluster_points: usize,

    /// Seed for centroid sampling; entropy when unset
    pub cluster_seed: Option<u64>,

    /// Score above which a sample is anomalous
    pub anomaly_threshold: f64,

    /// Score above which a sample is irregular
    pub irregular_threshold: f64,

    /// Forecast horizon in samples
    pub prediction_steps: usize,

    /// Samples used for the temperature trend
    pub regression_window: usize,

    /// Bounds for forecast temperatures (°C)
    pub temperature_clamp: TemperatureClamp,

    /// Mean activity below this is resting
    pub resting_below: f64,

    /// Mean activity below this is walking, above is grazing
    pub walking_below: f64,

    /// First daytime hour (inclusive)
    pub day_start_hour: u32,

    /// End of daytime (exclusive)
    pub day_end_hour: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            clusters: 3,
            min_cluster_points: DEFAULT_MIN_POINTS,
            cluster_seed: None,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            irregular_threshold: DEFAULT_IRREGULAR_THRESHOLD,
            prediction_steps: 6,
            regression_window: 10,
            temperature_clamp: TemperatureClamp::default(),
            resting_below: 5.0,
            walking_below: 10.0,
            day_start_hour: 6,
            day_end_hour: 18,
        }
    }
}

/// Scheduler cadences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ingestion and analysis tick period in milliseconds
    pub update_interval_ms: u64,

    /// Forecast on every n-th analysis tick
    pub forecast_every_ticks: u64,

    /// Refresh the baseline on every n-th analysis tick
    pub refresh_every_ticks: u64,

    /// Window length required before the analysis tick does any work
    pub min_analysis_samples: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 2000,
            forecast_every_ticks: 5,
            refresh_every_ticks: 30,
            min_analysis_samples: 11,
        }
    }
}

/// Sample source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Delimited telemetry file to replay; synthetic feed when unset
    pub csv_path: Option<PathBuf>,

    /// Rows appended before the scheduler starts
    pub preload_samples: usize,

    /// Seed for the synthetic feed
    pub synthetic_seed: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            preload_samples: 20,
            synthetic_seed: None,
        }
    }
}
