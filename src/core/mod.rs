//! Core engine module - owns the window and drives every analysis

mod engine;
mod scheduler;
mod event_bus;

pub use engine::{Engine, BaselineRefresh, RefreshOutcome};
pub use scheduler::{Scheduler, SchedulerReport};
pub use event_bus::{EventBus, Event, EventType, EventPayload};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine-wide counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemState {
    pub running: bool,
    pub total_samples: u64,
    pub total_alerts: u64,
    pub anomaly_checks: u64,
    pub anomalies_detected: u64,
    pub forecasts: u64,
    pub baseline_refreshes: u64,
    pub failed_operations: u64,
    pub uptime_seconds: u64,
    pub last_anomaly: Option<DateTime<Utc>>,
}
