//! Anomaly scoring - reconstruction error against a window baseline

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use nalgebra::Vector6;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::features;
use crate::error::{EngineError, EngineResult};
use crate::telemetry::TelemetrySample;

/// Score above which a sample is flagged as anomalous
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.8;
/// Score above which a sample is flagged as irregular
pub const DEFAULT_IRREGULAR_THRESHOLD: f64 = 0.5;

/// Classification band of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyBand {
    Normal,
    Irregular,
    Anomalous,
}

impl AnomalyBand {
    pub fn classify(score: f64, irregular_threshold: f64, anomaly_threshold: f64) -> Self {
        if score > anomaly_threshold {
            AnomalyBand::Anomalous
        } else if score > irregular_threshold {
            AnomalyBand::Irregular
        } else {
            AnomalyBand::Normal
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AnomalyBand::Normal => "normal",
            AnomalyBand::Irregular => "irregular behavior",
            AnomalyBand::Anomalous => "anomaly detected",
        }
    }
}

/// One scored sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub value: f64,
    pub sample_timestamp: DateTime<Utc>,
    pub band: AnomalyBand,
}

/// Mean feature vector of "normal" window behavior
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    mean: Vector6<f64>,
    samples: usize,
    fitted_at: DateTime<Utc>,
}

impl Baseline {
    /// Fits over every complete sample; incomplete ones are skipped.
    pub fn fit<'a>(samples: impl IntoIterator<Item = &'a TelemetrySample>) -> EngineResult<Self> {
        let vectors = features::feature_vectors(samples);
        if vectors.is_empty() {
            return Err(EngineError::InsufficientData { needed: 1, available: 0 });
        }

        let sum = vectors.iter().fold(Vector6::zeros(), |acc, v| acc + v);
        Ok(Self {
            mean: sum / vectors.len() as f64,
            samples: vectors.len(),
            fitted_at: Utc::now(),
        })
    }

    /// Mean squared error between the sample and the baseline mean.
    pub fn score(&self, sample: &TelemetrySample) -> EngineResult<f64> {
        let v = features::feature_vector(sample)?;
        Ok((v - self.mean).norm_squared() / 6.0)
    }

    pub fn mean(&self) -> &Vector6<f64> {
        &self.mean
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }
}

/// Scores samples against the last refreshed baseline
#[derive(Debug, Default)]
pub struct AnomalyScorer {
    baseline: Option<Baseline>,
}

impl AnomalyScorer {
    pub fn new() -> Self {
        Self { baseline: None }
    }

    /// Fits a fresh baseline from the window and scores `latest` against it.
    pub fn score<'a>(
        window: impl IntoIterator<Item = &'a TelemetrySample>,
        latest: &TelemetrySample,
    ) -> EngineResult<f64> {
        Baseline::fit(window)?.score(latest)
    }

    /// Scores against the installed baseline, fitting one from the window
    /// when no refresh has completed yet.
    pub fn score_latest<'a>(
        &self,
        window: impl IntoIterator<Item = &'a TelemetrySample>,
        latest: &TelemetrySample,
    ) -> EngineResult<f64> {
        match &self.baseline {
            Some(baseline) => baseline.score(latest),
            None => {
                debug!("No refreshed baseline yet, fitting from current window");
                Self::score(window, latest)
            }
        }
    }

    pub fn install(&mut self, baseline: Baseline) {
        debug!("Installed baseline fitted on {} samples", baseline.sample_count());
        self.baseline = Some(baseline);
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }
}

/// Bounded trend of recent scores, oldest evicted first
#[derive(Debug, Clone)]
pub struct ScoreHistory {
    scores: VecDeque<AnomalyScore>,
    capacity: usize,
}

impl ScoreHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            scores: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, score: AnomalyScore) {
        self.scores.push_back(score);
        while self.scores.len() > self.capacity {
            self.scores.pop_front();
        }
    }

    pub fn to_vec(&self) -> Vec<AnomalyScore> {
        self.scores.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&AnomalyScore> {
        self.scores.back()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(accel: [f64; 3], gyro: [f64; 3]) -> TelemetrySample {
        TelemetrySample::new(1, accel, gyro, 22.0, 3.9)
    }

    #[test]
    fn test_identical_sample_scores_zero() {
        let window: Vec<_> = (0..10).map(|_| sample([10.0, 0.4, 0.3], [-0.09, -0.01, -0.02])).collect();
        let probe = sample([10.0, 0.4, 0.3], [-0.09, -0.01, -0.02]);

        let score = AnomalyScorer::score(&window, &probe).unwrap();
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn test_score_monotonic_in_offset() {
        let window: Vec<_> = (0..10).map(|_| sample([10.0, 0.4, 0.3], [0.0; 3])).collect();

        let scores: Vec<f64> = [1.0, 5.0, 20.0]
            .iter()
            .map(|offset| {
                let probe = sample([10.0, 0.4 + offset, 0.3], [0.0; 3]);
                AnomalyScorer::score(&window, &probe).unwrap()
            })
            .collect();

        assert!(scores[0] > 0.0);
        assert!(scores[0] < scores[1]);
        assert!(scores[1] < scores[2]);
    }

    #[test]
    fn test_baseline_skips_incomplete_samples() {
        let mut broken = sample([100.0, 100.0, 100.0], [0.0; 3]);
        broken.gyro.x = None;
        let window = vec![sample([1.0, 1.0, 1.0], [0.0; 3]), broken];

        let baseline = Baseline::fit(&window).unwrap();
        assert_eq!(baseline.sample_count(), 1);
        assert_eq!(baseline.mean()[0], 1.0);
    }

    #[test]
    fn test_empty_window_is_insufficient() {
        let window: Vec<TelemetrySample> = Vec::new();
        let probe = sample([1.0, 1.0, 1.0], [0.0; 3]);
        assert_eq!(
            AnomalyScorer::score(&window, &probe),
            Err(EngineError::InsufficientData { needed: 1, available: 0 })
        );
    }

    #[test]
    fn test_installed_baseline_takes_precedence() {
        let old_window: Vec<_> = (0..5).map(|_| sample([0.0; 3], [0.0; 3])).collect();
        let new_window: Vec<_> = (0..5).map(|_| sample([6.0, 0.0, 0.0], [0.0; 3])).collect();
        let probe = sample([6.0, 0.0, 0.0], [0.0; 3]);

        let mut scorer = AnomalyScorer::new();
        assert!(scorer.score_latest(&new_window, &probe).unwrap().abs() < 1e-12);

        scorer.install(Baseline::fit(&old_window).unwrap());
        assert!((scorer.score_latest(&new_window, &probe).unwrap() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_bands() {
        assert_eq!(AnomalyBand::classify(0.81, 0.5, 0.8), AnomalyBand::Anomalous);
        assert_eq!(AnomalyBand::classify(0.8, 0.5, 0.8), AnomalyBand::Irregular);
        assert_eq!(AnomalyBand::classify(0.5, 0.5, 0.8), AnomalyBand::Normal);
        assert_eq!(AnomalyBand::classify(0.0, 0.5, 0.8), AnomalyBand::Normal);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = ScoreHistory::new(3);
        for i in 0..5 {
            history.push(AnomalyScore {
                value: i as f64,
                sample_timestamp: Utc::now(),
                band: AnomalyBand::Normal,
            });
        }

        let values: Vec<f64> = history.to_vec().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }
}
