// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Short-horizon forecasting: linear temperature trend and behavior outlook

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::features;
use crate::config::AnalysisConfig;
use crate::error::{EngineError, EngineResult};
use crate::telemetry::TelemetrySample;

/// Inclusive bounds applied to every forecast temperature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureClamp {
    pub min: f64,
    pub max: f64,
}

impl Default for TemperatureClamp {
    fn default() -> Self {
        Self { min: 15.0, max: 35.0 }
    }
}

impl TemperatureClamp {
    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Fitted OLS line of temperature against sample index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureTrend {
    pub slope: f64,
    pub intercept: f64,
    pub samples: usize,
}

impl TemperatureTrend {
    /// Closed-form least squares over x = 0..n-1.
    pub fn fit(temps: &[f64]) -> EngineResult<Self> {
        if temps.len() < 2 {
            return Err(EngineError::InsufficientHistory {
                needed: 2,
                available: temps.len(),
            });
        }

        let n = temps.len() as f64;
        let sum_x: f64 = (0..temps.len()).map(|i| i as f64).sum();
        let sum_y: f64 = temps.iter().sum();
        let sum_xy: f64 = temps.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();
        let sum_xx: f64 = (0..temps.len()).map(|i| (i * i) as f64).sum();

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < f64::EPSILON {
            return Err(EngineError::DegenerateRegression);
        }

        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;

        Ok(Self {
            slope,
            intercept,
            samples: temps.len(),
        })
    }

    /// `steps` values continuing past the fitted points, clamped.
    pub fn extrapolate(&self, steps: usize, clamp: &TemperatureClamp) -> Vec<f64> {
        (0..steps)
            .map(|i| clamp.apply(self.intercept + self.slope * (self.samples + i) as f64))
            .collect()
    }
}

/// Short-term activity state from mean activity magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityState {
    Resting,
    Walking,
    Grazing,
}

/// Medium-term direction of activity across the recent window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityTrend {
    IncreasingActivity,
    RestingPeriod,
}

/// Long-term outlook from time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircadianPhase {
    ActiveGrazing,
    NightRest,
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActivityState::Resting => "resting",
            ActivityState::Walking => "walking",
            ActivityState::Grazing => "grazing",
        })
    }
}

impl fmt::Display for ActivityTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActivityTrend::IncreasingActivity => "increasing activity",
            ActivityTrend::RestingPeriod => "resting period",
        })
    }
}

impl fmt::Display for CircadianPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircadianPhase::ActiveGrazing => "active grazing",
            CircadianPhase::NightRest => "night rest",
        })
    }
}

/// Behavior labels for the short, medium and long horizons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorOutlook {
    pub short_term: ActivityState,
    pub medium_term: ActivityTrend,
    pub long_term: CircadianPhase,
}

impl BehaviorOutlook {
    pub fn horizons(&self) -> [String; 3] {
        [
            self.short_term.to_string(),
            self.medium_term.to_string(),
            self.long_term.to_string(),
        ]
    }
}

/// Output of one forecasting pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// `None` when no recent sample carries a complete acceleration vector
    pub behavior: Option<BehaviorOutlook>,
    pub temperature_path: Vec<f64>,
    pub trend: TemperatureTrend,
}

/// Trend extrapolation and behavior heuristics over the recent window
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    regression_window: usize,
    prediction_steps: usize,
    clamp: TemperatureClamp,
    resting_below: f64,
    walking_below: f64,
    day_start_hour: u32,
    day_end_hour: u32,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl ForecastEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            regression_window: config.regression_window.max(2),
            prediction_steps: config.prediction_steps,
            clamp: config.temperature_clamp,
            resting_below: config.resting_below,
            walking_below: config.walking_below,
            day_start_hour: config.day_start_hour,
            day_end_hour: config.day_end_hour,
        }
    }

    fn recent<'a>(&self, samples: &'a [TelemetrySample]) -> &'a [TelemetrySample] {
        &samples[samples.len().saturating_sub(self.regression_window)..]
    }

    /// Temperature path over the most recent samples that carry a temperature.
    pub fn forecast_temperature(&self, samples: &[TelemetrySample]) -> EngineResult<(TemperatureTrend, Vec<f64>)> {
        let temps: Vec<f64> = samples.iter().filter_map(|s| s.temperature_c).collect();
        let recent = &temps[temps.len().saturating_sub(self.regression_window)..];

        let trend = TemperatureTrend::fit(recent)?;
        let path = trend.extrapolate(self.prediction_steps, &self.clamp);
        Ok((trend, path))
    }

    /// `hour` is the local wall-clock hour, 0..24.
    pub fn forecast_behavior(&self, samples: &[TelemetrySample], hour: u32) -> EngineResult<BehaviorOutlook> {
        let activities = features::activities(self.recent(samples));
        let (first, last) = match (activities.first(), activities.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(EngineError::InsufficientHistory { needed: 1, available: 0 });
            }
        };

        let mean = activities.iter().sum::<f64>() / activities.len() as f64;
        let short_term = if mean < self.resting_below {
            ActivityState::Resting
        } else if mean < self.walking_below {
            ActivityState::Walking
        } else {
            ActivityState::Grazing
        };

        let medium_term = if last - first > 0.0 {
            ActivityTrend::IncreasingActivity
        } else {
            ActivityTrend::RestingPeriod
        };

        let long_term = if (self.day_start_hour..self.day_end_hour).contains(&hour) {
            CircadianPhase::ActiveGrazing
        } else {
            CircadianPhase::NightRest
        };

        Ok(BehaviorOutlook {
            short_term,
            medium_term,
            long_term,
        })
    }

    /// Fails only when the temperature trend cannot be fitted.
    pub fn forecast(&self, samples: &[TelemetrySample], hour: u32) -> EngineResult<ForecastResult> {
        let (trend, temperature_path) = self.forecast_temperature(samples)?;
        let behavior = match self.forecast_behavior(samples, hour) {
            Ok(outlook) => Some(outlook),
            Err(e) => {
                debug!("Behavior outlook unavailable: {}", e);
                None
            }
        };

        Ok(ForecastResult {
            behavior,
            temperature_path,
            trend,
        })
    }
}
