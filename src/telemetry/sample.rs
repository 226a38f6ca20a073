// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Telemetry sample and axis types

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Three optional axis readings from one inertial sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Triaxial {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Triaxial {
    /// All three axes present. Non-finite values are stored as absent.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::from_options(Some(x), Some(y), Some(z))
    }

    pub fn from_options(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        Self {
            x: x.filter(|v| v.is_finite()),
            y: y.filter(|v| v.is_finite()),
            z: z.filter(|v| v.is_finite()),
        }
    }

    /// The full vector, or the name of the first missing axis.
    pub fn complete(&self) -> Result<Vector3<f64>, &'static str> {
        let x = self.x.ok_or("x")?;
        let y = self.y.ok_or("y")?;
        let z = self.z.ok_or("z")?;
        Ok(Vector3::new(x, y, z))
    }

    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some() && self.z.is_some()
    }
}

/// One reading from a collar sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub sensor_id: i64,
    /// Acceleration in m/s²
    pub accel: Triaxial,
    /// Angular rate
    pub gyro: Triaxial,
    pub temperature_c: Option<f64>,
    pub battery_volts: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub animal_name: String,
    pub collar_code: String,
}

impl TelemetrySample {
    /// Sample with every numeric field present and the current time.
    pub fn new(sensor_id: i64, accel: [f64; 3], gyro: [f64; 3], temperature_c: f64, battery_volts: f64) -> Self {
        Self {
            sensor_id,
            accel: Triaxial::new(accel[0], accel[1], accel[2]),
            gyro: Triaxial::new(gyro[0], gyro[1], gyro[2]),
            temperature_c: Some(temperature_c).filter(|v| v.is_finite()),
            battery_volts: Some(battery_volts).filter(|v| v.is_finite()),
            timestamp: Utc::now(),
            animal_name: String::new(),
            collar_code: String::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_identity(mut self, animal_name: &str, collar_code: &str) -> Self {
        self.animal_name = animal_name.to_string();
        self.collar_code = collar_code.to_string();
        self
    }

    /// Drops non-finite values that slipped in through the public fields.
    pub fn normalized(mut self) -> Self {
        self.accel = Triaxial::from_options(self.accel.x, self.accel.y, self.accel.z);
        self.gyro = Triaxial::from_options(self.gyro.x, self.gyro.y, self.gyro.z);
        self.temperature_c = self.temperature_c.filter(|v| v.is_finite());
        self.battery_volts = self.battery_volts.filter(|v| v.is_finite());
        self
    }
}
