// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Telemetry sources: delimited-text replay and the source trait

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::simulator::SyntheticFeed;
use super::{TelemetrySample, Triaxial};

/// Anything that yields collar samples in arrival order
#[async_trait]
pub trait TelemetrySource: Send {
    /// Source identifier for logs
    fn id(&self) -> &str;

    /// Next sample, or `None` once the source is exhausted
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>>;
}

/// One row as it appears in the file; every column optional
#[derive(Debug, Default, Deserialize)]
struct CsvRow {
    #[serde(default)]
    accel_x: Option<String>,
    #[serde(default)]
    accel_y: Option<String>,
    #[serde(default)]
    accel_z: Option<String>,
    #[serde(default)]
    gyro_x: Option<String>,
    #[serde(default)]
    gyro_y: Option<String>,
    #[serde(default)]
    gyro_z: Option<String>,
    #[serde(default)]
    temp: Option<String>,
    #[serde(default)]
    bateria: Option<String>,
    #[serde(default)]
    fecha: Option<String>,
    #[serde(default)]
    nombre_vaca: Option<String>,
    #[serde(default)]
    collar_codigo: Option<String>,
    #[serde(default)]
    sensor_id: Option<String>,
}

fn parse_number(field: &Option<String>) -> Option<f64> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_timestamp(field: &Option<String>) -> Option<DateTime<Utc>> {
    let raw = field.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl CsvRow {
    fn into_sample(self, row: usize) -> TelemetrySample {
        let timestamp = parse_timestamp(&self.fecha).unwrap_or_else(|| {
            debug!("Row {} has no usable fecha, stamping with ingestion time", row);
            Utc::now()
        });

        let sensor_id = self
            .sensor_id
            .as_deref()
            .map(str::trim)
            .and_then(|s| s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|v| v as i64)))
            .unwrap_or_default();

        TelemetrySample {
            sensor_id,
            accel: Triaxial::from_options(
                parse_number(&self.accel_x),
                parse_number(&self.accel_y),
                parse_number(&self.accel_z),
            ),
            gyro: Triaxial::from_options(
                parse_number(&self.gyro_x),
                parse_number(&self.gyro_y),
                parse_number(&self.gyro_z),
            ),
            temperature_c: parse_number(&self.temp),
            battery_volts: parse_number(&self.bateria),
            timestamp,
            animal_name: self.nombre_vaca.unwrap_or_default(),
            collar_code: self.collar_codigo.unwrap_or_default(),
        }
    }
}

/// Replays rows from a delimited file, in file order
pub struct CsvSource {
    id: String,
    rows: Vec<TelemetrySample>,
    cursor: usize,
}

impl CsvSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Could not open telemetry file {:?}", path))?;

        let mut source = Self::from_reader(file)
            .with_context(|| format!("Could not parse telemetry file {:?}", path))?;
        source.id = path.display().to_string();

        info!("Loaded {} telemetry rows from {:?}", source.rows.len(), path);
        Ok(source)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for (idx, record) in reader.deserialize::<CsvRow>().enumerate() {
            match record {
                Ok(row) => rows.push(row.into_sample(idx + 1)),
                Err(e) => {
                    warn!("Skipping invalid row {}: {}", idx + 1, e);
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!("Skipped {} unreadable rows, kept {}", skipped, rows.len());
        }

        Ok(Self {
            id: "csv".to_string(),
            rows,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.cursor
    }

    /// Next row without going through the async trait.
    pub fn next_row(&mut self) -> Option<TelemetrySample> {
        let sample = self.rows.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(sample)
    }
}

#[async_trait]
impl TelemetrySource for CsvSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        Ok(self.next_row())
    }
}

/// Replays a file, then keeps the stream alive with a random walk
/// continuing from the last replayed row
pub struct ReplaySource {
    csv: CsvSource,
    walk: Option<SyntheticFeed>,
    last: Option<TelemetrySample>,
    seed: Option<u64>,
}

impl ReplaySource {
    pub fn new(csv: CsvSource, seed: Option<u64>) -> Self {
        Self {
            csv,
            walk: None,
            last: None,
            seed,
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.walk.is_none()
    }

    fn next_row(&mut self) -> TelemetrySample {
        if self.walk.is_none() {
            if let Some(sample) = self.csv.next_row() {
                self.last = Some(sample.clone());
                return sample;
            }

            info!("Replay of {} exhausted, continuing with synthetic walk", self.csv.id());
        }

        let (last, seed) = (&mut self.last, self.seed);
        self.walk
            .get_or_insert_with(|| match last.take() {
                Some(last) => SyntheticFeed::continuing_from(last, seed),
                None => SyntheticFeed::new(seed),
            })
            .generate()
    }
}

#[async_trait]
impl TelemetrySource for ReplaySource {
    fn id(&self) -> &str {
        self.csv.id()
    }

    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        Ok(Some(self.next_row()))
    }
}
