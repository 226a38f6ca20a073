//! Descriptive statistics over the current window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::features;
use crate::telemetry::TelemetrySample;

/// Window-level figures for status reporting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub count: usize,
    pub mean_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub temperature_std_dev: Option<f64>,
    pub mean_activity: Option<f64>,
    pub latest_battery: Option<f64>,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

impl WindowSummary {
    pub fn from_samples(samples: &[TelemetrySample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let temps: Vec<f64> = samples.iter().filter_map(|s| s.temperature_c).collect();
        let activities = features::activities(samples);

        Self {
            count: samples.len(),
            mean_temperature: stat(&temps, 1, |v| Statistics::mean(v)),
            min_temperature: stat(&temps, 1, |v| Statistics::min(v)),
            max_temperature: stat(&temps, 1, |v| Statistics::max(v)),
            temperature_std_dev: stat(&temps, 2, |v| Statistics::std_dev(v)),
            mean_activity: stat(&activities, 1, |v| Statistics::mean(v)),
            latest_battery: samples.iter().rev().find_map(|s| s.battery_volts),
            latest_timestamp: samples.last().map(|s| s.timestamp),
        }
    }
}

/// `None` when fewer than `min_len` values are available.
fn stat(values: &[f64], min_len: usize, f: impl Fn(&[f64]) -> f64) -> Option<f64> {
    if values.len() < min_len {
        None
    } else {
        Some(f(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window() {
        assert_eq!(WindowSummary::from_samples(&[]), WindowSummary::default());
    }

    #[test]
    fn test_summary_values() {
        let mut last = TelemetrySample::new(3, [0.0, 0.0, 6.0], [0.0; 3], 24.0, 3.7);
        last.battery_volts = None;
        let samples = vec![
            TelemetrySample::new(1, [3.0, 4.0, 0.0], [0.0; 3], 20.0, 3.9),
            TelemetrySample::new(2, [0.0, 0.0, 1.0], [0.0; 3], 22.0, 3.8),
            last,
        ];

        let summary = WindowSummary::from_samples(&samples);
        assert_eq!(summary.count, 3);
        assert!((summary.mean_temperature.unwrap() - 22.0).abs() < 1e-12);
        assert_eq!(summary.min_temperature, Some(20.0));
        assert_eq!(summary.max_temperature, Some(24.0));
        assert!((summary.temperature_std_dev.unwrap() - 2.0).abs() < 1e-12);
        assert!((summary.mean_activity.unwrap() - 4.0).abs() < 1e-12);
        assert_eq!(summary.latest_battery, Some(3.8));
    }
}
