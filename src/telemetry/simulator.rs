// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Synthetic collar feed for demo/testing

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Uniform;

use super::{TelemetrySample, TelemetrySource, Triaxial};

/// Generates plausible collar readings, then random-walks from the last one
pub struct SyntheticFeed {
    id: String,
    rng: StdRng,
    last: Option<TelemetrySample>,
    next_sensor_id: i64,
    animal_name: String,
    collar_code: String,
}

impl SyntheticFeed {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            id: "synthetic".to_string(),
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
            last: None,
            next_sensor_id: 1,
            animal_name: "Test Cow".to_string(),
            collar_code: "COLLAR-001".to_string(),
        }
    }

    /// Continues the walk from an existing sample, keeping its identity.
    pub fn continuing_from(last: TelemetrySample, seed: Option<u64>) -> Self {
        let mut feed = Self::new(seed);
        feed.next_sensor_id = last.sensor_id + 1;
        feed.animal_name = last.animal_name.clone();
        feed.collar_code = last.collar_code.clone();
        feed.last = Some(last);
        feed
    }

    /// A resting-posture reading around the collar's usual operating point.
    fn generate_base(&mut self) -> TelemetrySample {
        let jitter = |rng: &mut StdRng, centre: f64, half_width: f64| {
            centre + rng.sample(Uniform::new_inclusive(-half_width, half_width))
        };

        let accel = [
            jitter(&mut self.rng, 10.0, 1.0),
            jitter(&mut self.rng, 0.4, 0.15),
            jitter(&mut self.rng, 0.3, 0.1),
        ];
        let gyro = [
            jitter(&mut self.rng, -0.09, 0.01),
            jitter(&mut self.rng, -0.01, 0.01),
            jitter(&mut self.rng, -0.02, 0.01),
        ];
        let temp = jitter(&mut self.rng, 23.0, 2.0);
        let battery = jitter(&mut self.rng, 3.85, 0.25);

        TelemetrySample::new(self.next_sensor_id, accel, gyro, temp, battery)
            .with_identity(&self.animal_name, &self.collar_code)
    }

    fn generate_step(&mut self, last: &TelemetrySample) -> TelemetrySample {
        let base = self.generate_base();
        let mut step = |prev: Option<f64>, fallback: Option<f64>, half_width: f64| {
            prev.or(fallback)
                .map(|v| v + self.rng.gen_range(-half_width..half_width))
        };

        let accel = Triaxial::from_options(
            step(last.accel.x, base.accel.x, 0.25),
            step(last.accel.y, base.accel.y, 0.05),
            step(last.accel.z, base.accel.z, 0.05),
        );
        let gyro = Triaxial::from_options(
            step(last.gyro.x, base.gyro.x, 0.01),
            step(last.gyro.y, base.gyro.y, 0.01),
            step(last.gyro.z, base.gyro.z, 0.01),
        );
        let temperature_c = step(last.temperature_c, base.temperature_c, 1.0).map(|t| t.clamp(15.0, 35.0));
        let battery_volts = step(last.battery_volts, base.battery_volts, 0.05).map(|v| v.clamp(0.0, 5.0));

        TelemetrySample {
            sensor_id: self.next_sensor_id,
            accel,
            gyro,
            temperature_c,
            battery_volts,
            timestamp: Utc::now(),
            animal_name: self.animal_name.clone(),
            collar_code: self.collar_code.clone(),
        }
    }

    pub fn generate(&mut self) -> TelemetrySample {
        let sample = match self.last.take() {
            Some(last) => self.generate_step(&last),
            None => self.generate_base(),
        };

        self.next_sensor_id += 1;
        self.last = Some(sample.clone());
        sample
    }
}

#[async_trait]
impl TelemetrySource for SyntheticFeed {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        Ok(Some(self.generate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_readings_in_expected_ranges() {
        let mut feed = SyntheticFeed::new(Some(7));
        let sample = feed.generate();

        let ax = sample.accel.x.unwrap();
        assert!((9.0..=11.0).contains(&ax));
        let temp = sample.temperature_c.unwrap();
        assert!((21.0..=25.0).contains(&temp));
        assert_eq!(sample.collar_code, "COLLAR-001");
    }

    #[test]
    fn test_walk_stays_clamped() {
        let mut feed = SyntheticFeed::new(Some(11));
        let mut previous = feed.generate();

        for _ in 0..500 {
            let sample = feed.generate();
            let temp = sample.temperature_c.unwrap();
            let battery = sample.battery_volts.unwrap();
            assert!((15.0..=35.0).contains(&temp));
            assert!((0.0..=5.0).contains(&battery));
            assert!((sample.accel.x.unwrap() - previous.accel.x.unwrap()).abs() <= 0.25);
            assert_eq!(sample.sensor_id, previous.sensor_id + 1);
            previous = sample;
        }
    }

    #[test]
    fn test_continuing_keeps_identity() {
        let last = TelemetrySample::new(41, [1.0, 1.0, 1.0], [0.0; 3], 20.0, 3.5)
            .with_identity("Daisy", "COLLAR-042");
        let mut feed = SyntheticFeed::continuing_from(last, Some(3));

        let next = feed.generate();
        assert_eq!(next.sensor_id, 42);
        assert_eq!(next.animal_name, "Daisy");
        assert!((next.temperature_c.unwrap() - 20.0).abs() <= 1.0);
    }

    #[tokio::test]
    async fn test_source_never_exhausts() {
        let mut feed = SyntheticFeed::new(Some(1));
        for _ in 0..3 {
            assert!(feed.next_sample().await.unwrap().is_some());
        }
    }
}
