// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! CollarWatch - streaming analytics for livestock collar telemetry
//!
//! Samples from a collar (three-axis accelerometer, gyroscope, temperature,
//! battery) flow into a bounded sliding window. Each sample is checked
//! against alert thresholds as it arrives; on a slower cadence the window is
//! scored for anomalies, partitioned into behavior groups and extrapolated
//! into short-term forecasts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CollarWatch Engine                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────┐  ┌───────────┐  ┌──────────┐  │
//! │  │ Telemetry │→ │  Window  │→ │ Analysis  │→ │ Detection│  │
//! │  │  Source   │  │  Buffer  │  │ (score,   │  │ (alerts) │  │
//! │  │           │  │          │  │ forecast) │  │          │  │
//! │  └───────────┘  └──────────┘  └───────────┘  └──────────┘  │
//! │       ↑              ↓             ↓              ↓        │
//! │  ┌──────────┐  ┌─────────────────────────────────────────┐ │
//! │  │Scheduler │  │                Event Bus                │ │
//! │  └──────────┘  └─────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod telemetry;
pub mod analysis;
pub mod detection;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use config::Config;
pub use core::{Engine, EventBus, Scheduler};
pub use telemetry::{TelemetrySample, TelemetrySource, SlidingWindowBuffer};
pub use analysis::{AnomalyScore, Cluster, ForecastResult};
pub use detection::{AlertEvent, AlertKind, AlertThresholds};
pub use error::{EngineError, EngineResult};

/// CollarWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CollarWatch name
pub const NAME: &str = "CollarWatch";
