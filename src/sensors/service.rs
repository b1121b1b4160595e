use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;

use crate::db::{
    models::{round_to, Alert, SensorReading},
    Store, StoreResult,
};

/// Longest look-back window any time-window query covers.
pub const MAX_HISTORY_HOURS: u32 = 168;

/// Alerts are only drawn from readings this recent.
pub const ALERT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SensorStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Value from the newest reading carrying this sensor.
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatsSummary {
    pub total_readings: usize,
    pub total_alerts: i64,
    pub period_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Statistics {
    pub sensors: BTreeMap<String, SensorStats>,
    pub summary: StatsSummary,
}

/// Read-only view over the reading stream.
#[derive(Debug, Clone)]
pub struct SensorService {
    store: Store,
}

impl SensorService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn latest(&self, greenhouse_id: &str) -> StoreResult<Option<SensorReading>> {
        self.store.latest_reading(greenhouse_id).await
    }

    /// Readings from the last `hours` hours (capped at `MAX_HISTORY_HOURS`),
    /// oldest first.
    pub async fn history(&self, greenhouse_id: &str, hours: u32) -> StoreResult<Vec<SensorReading>> {
        let hours = hours.min(MAX_HISTORY_HOURS);
        let to = Utc::now();
        let from = to - Duration::hours(i64::from(hours));
        debug!(greenhouse_id = %greenhouse_id, hours, "Fetching reading history");
        self.store.readings_between(greenhouse_id, from, to).await
    }

    /// Per-sensor min/max/avg/current over the last `hours` hours (capped at
    /// `MAX_HISTORY_HOURS`), or `None` when the window holds no readings.
    pub async fn statistics(&self, greenhouse_id: &str, hours: u32) -> StoreResult<Option<Statistics>> {
        let hours = hours.min(MAX_HISTORY_HOURS);
        let to = Utc::now();
        let from = to - Duration::hours(i64::from(hours));
        let readings = self.store.readings_between(greenhouse_id, from, to).await?;
        Ok(compute_statistics(&readings, hours))
    }

    /// Up to `limit` alerts from the last 24 hours, newest reading first.
    pub async fn alerts(&self, greenhouse_id: &str, limit: usize) -> StoreResult<Vec<Alert>> {
        let since = Utc::now() - Duration::hours(ALERT_WINDOW_HOURS);
        let readings = self.store.alerting_readings_since(greenhouse_id, since).await?;
        Ok(flatten_alerts(&readings, limit))
    }

    pub async fn greenhouse_ids(&self) -> StoreResult<BTreeSet<String>> {
        self.store.greenhouse_ids().await
    }
}

/// `readings` must be oldest first.
pub fn compute_statistics(readings: &[SensorReading], hours: u32) -> Option<Statistics> {
    if readings.is_empty() {
        return None;
    }

    let mut values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for reading in readings {
        for (name, sensor) in &reading.sensors {
            values.entry(name.as_str()).or_default().push(sensor.value);
        }
    }

    let sensors = values
        .into_iter()
        .filter_map(|(name, vals)| {
            let current = *vals.last()?;
            let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = vals.iter().sum::<f64>() / vals.len() as f64;
            Some((
                name.to_owned(),
                SensorStats {
                    min: round_to(min, 2),
                    max: round_to(max, 2),
                    avg: round_to(avg, 2),
                    current,
                },
            ))
        })
        .collect();

    Some(Statistics {
        sensors,
        summary: StatsSummary {
            total_readings: readings.len(),
            total_alerts: readings.iter().map(|r| i64::from(r.alert_count)).sum(),
            period_hours: hours,
        },
    })
}

/// Flatten each reading's alert list in order, tagging every alert with
/// `reading_timestamp`, and stop at `limit` alerts.
pub fn flatten_alerts(readings: &[SensorReading], limit: usize) -> Vec<Alert> {
    readings
        .iter()
        .flat_map(|reading| {
            let ts = Value::String(reading.timestamp.to_rfc3339());
            reading.alerts.iter().map(move |alert| {
                let mut alert = alert.clone();
                alert.insert("reading_timestamp".into(), ts.clone());
                alert
            })
        })
        .take(limit)
        .collect()
}
