// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Nearest-centroid partitioning of (activity, temperature) points
//!
//! Centroids are drawn from the input on every call and never refined, so
//! assignments are not stable across calls on the same data. Seeding the
//! engine makes the sequence of calls reproducible, nothing more.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::features;
use crate::error::{EngineError, EngineResult};
use crate::telemetry::TelemetrySample;

/// Minimum points for a meaningful partition
pub const DEFAULT_MIN_POINTS: usize = 5;

/// A point in (activity, temperature) space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterPoint {
    /// Position of the source sample in the window
    pub index: usize,
    pub activity: f64,
    pub temperature: f64,
}

impl ClusterPoint {
    fn distance_to(&self, centroid: &Centroid) -> f64 {
        ((self.activity - centroid.activity).powi(2) + (self.temperature - centroid.temperature).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub activity: f64,
    pub temperature: f64,
}

/// One group of a partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub label: String,
    pub centroid: Centroid,
    pub members: Vec<ClusterPoint>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Builds clustering points from samples carrying both a complete
/// acceleration vector and a temperature.
pub fn points_from_window<'a>(samples: impl IntoIterator<Item = &'a TelemetrySample>) -> Vec<ClusterPoint> {
    samples
        .into_iter()
        .enumerate()
        .filter_map(|(index, sample)| {
            let activity = match features::activity(sample) {
                Ok(a) => a,
                Err(e) => {
                    debug!("Skipping sample {} for clustering: {}", sample.sensor_id, e);
                    return None;
                }
            };
            let temperature = sample.temperature_c?;
            Some(ClusterPoint { index, activity, temperature })
        })
        .collect()
}

/// Single-pass nearest-centroid clustering
pub struct ClusterEngine {
    rng: ChaCha8Rng,
    min_points: usize,
}

impl ClusterEngine {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64),
            min_points: DEFAULT_MIN_POINTS,
        }
    }

    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points.max(1);
        self
    }

    pub fn cluster(&mut self, points: &[ClusterPoint], k: usize) -> EngineResult<Vec<Cluster>> {
        if k == 0 {
            return Err(EngineError::InvalidClusterCount(k));
        }
        if points.len() < self.min_points {
            return Err(EngineError::InsufficientData {
                needed: self.min_points,
                available: points.len(),
            });
        }

        // Seeds drawn with replacement
        let centroids: Vec<Centroid> = (0..k)
            .map(|_| {
                let seed = points[self.rng.gen_range(0..points.len())];
                Centroid {
                    activity: seed.activity,
                    temperature: seed.temperature,
                }
            })
            .collect();

        let mut clusters: Vec<Cluster> = centroids
            .iter()
            .enumerate()
            .map(|(i, centroid)| Cluster {
                label: format!("Cluster {}", i + 1),
                centroid: *centroid,
                members: Vec::new(),
            })
            .collect();

        for point in points {
            clusters[nearest(point, &centroids)].members.push(*point);
        }

        debug!(
            "Clustered {} points into {} groups: {:?}",
            points.len(),
            k,
            clusters.iter().map(Cluster::len).collect::<Vec<_>>()
        );

        Ok(clusters)
    }
}

/// Index of the closest centroid; strict comparison keeps the lowest index on ties.
fn nearest(point: &ClusterPoint, centroids: &[Centroid]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;

    for (i, centroid) in centroids.iter().enumerate() {
        let dist = point.distance_to(centroid);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(index: usize, activity: f64, temperature: f64) -> ClusterPoint {
        ClusterPoint { index, activity, temperature }
    }

    #[test]
    fn test_identical_points_single_cluster() {
        let points: Vec<_> = (0..5).map(|i| point(i, 10.0, 23.0)).collect();
        let mut engine = ClusterEngine::new(Some(42));

        let clusters = engine.cluster(&points, 3).unwrap();
        assert_eq!(clusters.len(), 3);

        let non_empty: Vec<_> = clusters.iter().filter(|c| !c.is_empty()).collect();
        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].label, "Cluster 1");
        assert_eq!(non_empty[0].len(), 5);
    }

    #[test]
    fn test_insufficient_points() {
        let points: Vec<_> = (0..4).map(|i| point(i, 1.0, 20.0)).collect();
        let mut engine = ClusterEngine::new(Some(1));

        assert_eq!(
            engine.cluster(&points, 3),
            Err(EngineError::InsufficientData { needed: 5, available: 4 })
        );
    }

    #[test]
    fn test_zero_k_rejected() {
        let points: Vec<_> = (0..6).map(|i| point(i, 1.0, 20.0)).collect();
        let mut engine = ClusterEngine::new(Some(1));
        assert_eq!(engine.cluster(&points, 0), Err(EngineError::InvalidClusterCount(0)));
    }

    #[test]
    fn test_every_point_assigned_to_nearest_centroid() {
        let points: Vec<_> = (0..30)
            .map(|i| point(i, (i % 3) as f64 * 5.0, 20.0 + (i % 5) as f64))
            .collect();
        let mut engine = ClusterEngine::new(Some(7));

        let clusters = engine.cluster(&points, 3).unwrap();
        assert_eq!(clusters.iter().map(Cluster::len).sum::<usize>(), points.len());

        for cluster in &clusters {
            for member in &cluster.members {
                let own = member.distance_to(&cluster.centroid);
                assert!(clusters.iter().all(|other| own <= member.distance_to(&other.centroid)));
            }
        }
    }

    #[test]
    fn test_seeded_engines_agree() {
        let points: Vec<_> = (0..20).map(|i| point(i, i as f64, 20.0 + i as f64 * 0.1)).collect();
        let mut a = ClusterEngine::new(Some(99));
        let mut b = ClusterEngine::new(Some(99));

        assert_eq!(a.cluster(&points, 3).unwrap(), b.cluster(&points, 3).unwrap());
    }

    #[test]
    fn test_points_skip_incomplete_samples() {
        let mut no_temp = TelemetrySample::new(2, [1.0, 0.0, 0.0], [0.0; 3], 20.0, 3.9);
        no_temp.temperature_c = None;
        let samples = vec![
            TelemetrySample::new(1, [3.0, 4.0, 0.0], [0.0; 3], 21.0, 3.9),
            no_temp,
            TelemetrySample::new(3, [0.0, 0.0, 1.0], [0.0; 3], 22.0, 3.9),
        ];

        let points = points_from_window(&samples);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], point(0, 5.0, 21.0));
        assert_eq!(points[1].index, 2);
    }
}
