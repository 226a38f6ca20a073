// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event bus handing engine results to presentation

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::{AnomalyScore, Cluster, ForecastResult};
use crate::detection::AlertEvent;
use crate::telemetry::TelemetrySample;

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Sample,
    Alert,
    Anomaly,
    Forecast,
    Clusters,
    Error,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Sample(TelemetrySample),
    Alert(AlertEvent),
    Anomaly(AnomalyScore),
    Forecast(ForecastResult),
    Clusters(Vec<Cluster>),
    Error { message: String },
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    alert_tx: broadcast::Sender<AlertEvent>,
    score_tx: broadcast::Sender<AnomalyScore>,
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (alert_tx, _) = broadcast::channel(capacity);
        let (score_tx, _) = broadcast::channel(capacity);
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            alert_tx,
            score_tx,
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish_sample(&self, sample: TelemetrySample) {
        self.publish_event(EventType::Sample, EventPayload::Sample(sample));
    }

    pub fn publish_alert(&self, alert: AlertEvent) {
        let _ = self.alert_tx.send(alert.clone());
        self.publish_event(EventType::Alert, EventPayload::Alert(alert));
    }

    pub fn publish_score(&self, score: AnomalyScore) {
        let _ = self.score_tx.send(score);
        self.publish_event(EventType::Anomaly, EventPayload::Anomaly(score));
    }

    pub fn publish_forecast(&self, forecast: ForecastResult) {
        self.publish_event(EventType::Forecast, EventPayload::Forecast(forecast));
    }

    pub fn publish_clusters(&self, clusters: Vec<Cluster>) {
        self.publish_event(EventType::Clusters, EventPayload::Clusters(clusters));
    }

    pub fn publish_error(&self, message: &str) {
        self.publish_event(
            EventType::Error,
            EventPayload::Error {
                message: message.to_string(),
            },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_tx.subscribe()
    }

    pub fn subscribe_scores(&self) -> broadcast::Receiver<AnomalyScore> {
        self.score_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
