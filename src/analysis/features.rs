//! Feature derivation from single samples

use nalgebra::Vector6;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::telemetry::TelemetrySample;

/// Euclidean norm of the acceleration vector, a proxy for movement intensity
pub fn activity(sample: &TelemetrySample) -> EngineResult<f64> {
    sample
        .accel
        .complete()
        .map(|a| a.norm())
        .map_err(|axis| EngineError::IncompleteSample { field: accel_field(axis) })
}

/// (ax, ay, az, gx, gy, gz)
pub fn feature_vector(sample: &TelemetrySample) -> EngineResult<Vector6<f64>> {
    let a = sample
        .accel
        .complete()
        .map_err(|axis| EngineError::IncompleteSample { field: accel_field(axis) })?;
    let g = sample
        .gyro
        .complete()
        .map_err(|axis| EngineError::IncompleteSample { field: gyro_field(axis) })?;

    Ok(Vector6::new(a.x, a.y, a.z, g.x, g.y, g.z))
}

fn accel_field(axis: &'static str) -> &'static str {
    match axis {
        "x" => "accel_x",
        "y" => "accel_y",
        _ => "accel_z",
    }
}

fn gyro_field(axis: &'static str) -> &'static str {
    match axis {
        "x" => "gyro_x",
        "y" => "gyro_y",
        _ => "gyro_z",
    }
}

/// Features of one sample, recomputed on every analysis pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeaturePoint {
    pub activity: f64,
    pub vector: Vector6<f64>,
}

impl FeaturePoint {
    pub fn extract(sample: &TelemetrySample) -> EngineResult<Self> {
        let vector = feature_vector(sample)?;
        Ok(Self {
            activity: vector.fixed_rows::<3>(0).norm(),
            vector,
        })
    }
}

/// Activity of every sample that has a complete acceleration vector.
pub fn activities<'a>(samples: impl IntoIterator<Item = &'a TelemetrySample>) -> Vec<f64> {
    samples
        .into_iter()
        .filter_map(|s| match activity(s) {
            Ok(a) => Some(a),
            Err(e) => {
                debug!("Skipping sample {}: {}", s.sensor_id, e);
                None
            }
        })
        .collect()
}

/// Feature vectors of every complete sample.
pub fn feature_vectors<'a>(samples: impl IntoIterator<Item = &'a TelemetrySample>) -> Vec<Vector6<f64>> {
    samples
        .into_iter()
        .filter_map(|s| match feature_vector(s) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Skipping sample {}: {}", s.sensor_id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Triaxial;

    fn sample(accel: [f64; 3]) -> TelemetrySample {
        TelemetrySample::new(1, accel, [0.1, 0.2, 0.3], 22.0, 3.9)
    }

    #[test]
    fn test_activity_norm() {
        assert!((activity(&sample([3.0, 4.0, 0.0])).unwrap() - 5.0).abs() < 1e-12);
        assert_eq!(activity(&sample([0.0, 0.0, 0.0])).unwrap(), 0.0);
        assert!(activity(&sample([0.0, 0.0, 1e-9])).unwrap() > 0.0);
    }

    #[test]
    fn test_activity_sign_invariant() {
        let base = activity(&sample([1.5, -2.0, 9.8])).unwrap();
        for flipped in [[-1.5, -2.0, 9.8], [1.5, 2.0, 9.8], [1.5, -2.0, -9.8]] {
            assert!((activity(&sample(flipped)).unwrap() - base).abs() < 1e-12);
        }
    }

    #[test]
    fn test_feature_vector_order() {
        let v = feature_vector(&sample([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);

        let point = FeaturePoint::extract(&sample([3.0, 4.0, 0.0])).unwrap();
        assert!((point.activity - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_incomplete_sample_names_field() {
        let mut s = sample([1.0, 2.0, 3.0]);
        s.gyro = Triaxial::from_options(Some(0.1), None, Some(0.3));

        assert!(activity(&s).is_ok());
        assert_eq!(
            feature_vector(&s),
            Err(EngineError::IncompleteSample { field: "gyro_y" })
        );
    }

    #[test]
    fn test_aggregates_skip_incomplete() {
        let mut broken = sample([1.0, 1.0, 1.0]);
        broken.accel.z = None;
        let samples = vec![sample([3.0, 4.0, 0.0]), broken, sample([0.0, 0.0, 2.0])];

        assert_eq!(activities(&samples), vec![5.0, 2.0]);
        assert_eq!(feature_vectors(&samples).len(), 2);
    }
}
