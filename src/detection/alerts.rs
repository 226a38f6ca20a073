// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Threshold alert rules

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::features;
use crate::error::{EngineError, EngineResult};
use crate::telemetry::TelemetrySample;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertKind {
    Info,
    Warning,
    Danger,
}

/// Which threshold rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertRule {
    Temperature,
    Activity,
    Battery,
}

/// Alert event handed to presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub kind: AlertKind,
    /// `None` for informational events not produced by a rule
    pub rule: Option<AlertRule>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn info(message: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: AlertKind::Info,
            rule: None,
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn rule(kind: AlertKind, rule: AlertRule, message: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            rule: Some(rule),
            message,
            timestamp,
        }
    }
}

/// Alert thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Warn above this temperature (°C)
    pub temp_max: f64,

    /// Warn above this activity magnitude (m/s²)
    pub accel_max: f64,

    /// Danger below this battery voltage (V)
    pub battery_min: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temp_max: 30.0,
            accel_max: 15.0,
            battery_min: 3.0,
        }
    }
}

fn check_threshold(field: &'static str, value: f64) -> EngineResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::ConfigOutOfRange { field, value })
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> EngineResult<()> {
        check_threshold("temp_max", self.temp_max)?;
        check_threshold("accel_max", self.accel_max)?;
        check_threshold("battery_min", self.battery_min)?;
        Ok(())
    }
}

/// Partial threshold update; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertConfigUpdate {
    #[serde(default)]
    pub temp_max: Option<f64>,
    #[serde(default)]
    pub accel_max: Option<f64>,
    #[serde(default)]
    pub battery_min: Option<f64>,
}

impl AlertConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.temp_max.is_none() && self.accel_max.is_none() && self.battery_min.is_none()
    }
}

/// Shared, replaceable thresholds; clones see each other's updates
#[derive(Debug, Clone, Default)]
pub struct AlertConfigHandle {
    inner: Arc<RwLock<AlertThresholds>>,
}

impl AlertConfigHandle {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            inner: Arc::new(RwLock::new(thresholds)),
        }
    }

    pub fn get(&self) -> AlertThresholds {
        *self.inner.read()
    }

    /// Applies every provided field, or none of them if any is out of range.
    pub fn update(&self, update: AlertConfigUpdate) -> EngineResult<AlertThresholds> {
        let mut guard = self.inner.write();
        let mut next = *guard;

        if let Some(v) = update.temp_max {
            next.temp_max = check_threshold("temp_max", v)?;
        }
        if let Some(v) = update.accel_max {
            next.accel_max = check_threshold("accel_max", v)?;
        }
        if let Some(v) = update.battery_min {
            next.battery_min = check_threshold("battery_min", v)?;
        }

        *guard = next;
        info!(
            "Alert thresholds updated: temp_max={} accel_max={} battery_min={}",
            next.temp_max, next.accel_max, next.battery_min
        );
        Ok(next)
    }
}

/// Per-sample threshold rules: temperature, then activity, then battery
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    config: AlertConfigHandle,
}

impl AlertEvaluator {
    pub fn new(config: AlertConfigHandle) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlertConfigHandle {
        &self.config
    }

    pub fn evaluate(&self, sample: &TelemetrySample) -> Vec<AlertEvent> {
        let thresholds = self.config.get();
        let mut alerts = Vec::new();

        if let Some(temp) = sample.temperature_c {
            if temp > thresholds.temp_max {
                alerts.push(AlertEvent::rule(
                    AlertKind::Warning,
                    AlertRule::Temperature,
                    format!("High temperature: {:.1}°C", temp),
                    sample.timestamp,
                ));
            }
        }

        match features::activity(sample) {
            Ok(activity) if activity > thresholds.accel_max => {
                alerts.push(AlertEvent::rule(
                    AlertKind::Warning,
                    AlertRule::Activity,
                    format!("Unusual activity detected: {:.2} m/s²", activity),
                    sample.timestamp,
                ));
            }
            Ok(_) => {}
            Err(e) => debug!("Activity rule skipped for sample {}: {}", sample.sensor_id, e),
        }

        if let Some(battery) = sample.battery_volts {
            if battery < thresholds.battery_min {
                alerts.push(AlertEvent::rule(
                    AlertKind::Danger,
                    AlertRule::Battery,
                    format!("Low battery: {:.2}V", battery),
                    sample.timestamp,
                ));
            }
        }

        alerts
    }
}
