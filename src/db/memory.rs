use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    models::{ActuatorCommand, ActuatorKind, SensorReading, ThresholdConfig},
    StoreError, StoreResult,
};

/// In-process store used by the test suite.
///
/// Clones share state. Individual greenhouses (or the configuration record)
/// can be switched into a failing mode to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    readings: Vec<SensorReading>,
    commands: Vec<ActuatorCommand>,
    thresholds: Option<ThresholdConfig>,
    failing_greenhouses: HashSet<String>,
    config_unavailable: bool,
    config_reads_failing: bool,
    config_writes_failing: bool,
}

impl Inner {
    fn check(&self, greenhouse_id: &str) -> StoreResult<()> {
        if self.failing_greenhouses.contains(greenhouse_id) {
            return Err(StoreError::Unavailable(format!(
                "injected failure for {greenhouse_id}"
            )));
        }
        Ok(())
    }

    fn check_config(&self, failing: bool) -> StoreResult<()> {
        if self.config_unavailable || failing {
            return Err(StoreError::Unavailable("injected config failure".into()));
        }
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_reading(&self, reading: SensorReading) {
        self.inner.write().await.readings.push(reading);
    }

    pub async fn fail_greenhouse(&self, greenhouse_id: &str) {
        self.inner
            .write()
            .await
            .failing_greenhouses
            .insert(greenhouse_id.to_owned());
    }

    pub async fn set_config_unavailable(&self, unavailable: bool) {
        self.inner.write().await.config_unavailable = unavailable;
    }

    pub async fn set_config_reads_failing(&self, failing: bool) {
        self.inner.write().await.config_reads_failing = failing;
    }

    pub async fn set_config_writes_failing(&self, failing: bool) {
        self.inner.write().await.config_writes_failing = failing;
    }

    /// Every stored command, in write order.
    pub async fn commands(&self) -> Vec<ActuatorCommand> {
        self.inner.read().await.commands.clone()
    }

    /// The raw persisted threshold record, bypassing failure injection.
    pub async fn stored_thresholds(&self) -> Option<ThresholdConfig> {
        self.inner.read().await.thresholds
    }

    pub(super) async fn latest_reading(&self, greenhouse_id: &str) -> StoreResult<Option<SensorReading>> {
        let inner = self.inner.read().await;
        inner.check(greenhouse_id)?;
        Ok(inner
            .readings
            .iter()
            .filter(|r| r.greenhouse_id == greenhouse_id)
            .max_by_key(|r| r.timestamp)
            .cloned())
    }

    pub(super) async fn readings_between(
        &self,
        greenhouse_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<SensorReading>> {
        let inner = self.inner.read().await;
        inner.check(greenhouse_id)?;
        let mut rows: Vec<_> = inner
            .readings
            .iter()
            .filter(|r| r.greenhouse_id == greenhouse_id && r.timestamp >= from && r.timestamp <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }

    pub(super) async fn alerting_readings_since(
        &self,
        greenhouse_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SensorReading>> {
        let inner = self.inner.read().await;
        inner.check(greenhouse_id)?;
        let mut rows: Vec<_> = inner
            .readings
            .iter()
            .filter(|r| r.greenhouse_id == greenhouse_id && r.timestamp >= since && r.alert_count > 0)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    pub(super) async fn greenhouse_ids(&self) -> StoreResult<BTreeSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner.readings.iter().map(|r| r.greenhouse_id.clone()).collect())
    }

    pub(super) async fn latest_command(
        &self,
        greenhouse_id: &str,
        actuator: ActuatorKind,
    ) -> StoreResult<Option<ActuatorCommand>> {
        let inner = self.inner.read().await;
        inner.check(greenhouse_id)?;
        // max_by_key keeps the last of equal timestamps, i.e. the latest write.
        Ok(inner
            .commands
            .iter()
            .filter(|c| c.greenhouse_id == greenhouse_id && c.actuator == actuator)
            .max_by_key(|c| c.timestamp)
            .cloned())
    }

    pub(super) async fn commands_between(
        &self,
        greenhouse_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ActuatorCommand>> {
        let inner = self.inner.read().await;
        inner.check(greenhouse_id)?;
        let mut rows: Vec<_> = inner
            .commands
            .iter()
            .rev()
            .filter(|c| c.greenhouse_id == greenhouse_id && c.timestamp >= from && c.timestamp <= to)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    pub(super) async fn append_command(&self, command: &ActuatorCommand) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.check(&command.greenhouse_id)?;
        inner.commands.push(command.clone());
        Ok(())
    }

    pub(super) async fn load_thresholds(&self) -> StoreResult<Option<ThresholdConfig>> {
        let inner = self.inner.read().await;
        inner.check_config(inner.config_reads_failing)?;
        Ok(inner.thresholds)
    }

    pub(super) async fn save_thresholds(&self, config: &ThresholdConfig) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.check_config(inner.config_writes_failing)?;
        inner.thresholds = Some(*config);
        Ok(())
    }
}
