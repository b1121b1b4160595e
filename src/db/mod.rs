#[cfg(test)]
pub mod memory;
pub mod models;
mod postgres;

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use self::models::{ActuatorCommand, ActuatorKind, SensorReading, ThresholdConfig};

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed stored record: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Handle to the reading stream, the command log and the configuration
/// record. Cheap to clone.
///
/// Every call is a single query; failures surface immediately and are never
/// retried.
#[derive(Debug, Clone)]
pub enum Store {
    Postgres(PgPool),
    #[cfg(test)]
    Memory(memory::MemoryStore),
}

impl Store {
    /// Most recent reading for `greenhouse_id`, if any.
    pub async fn latest_reading(&self, greenhouse_id: &str) -> StoreResult<Option<SensorReading>> {
        match self {
            Store::Postgres(pool) => postgres::latest_reading(pool, greenhouse_id).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.latest_reading(greenhouse_id).await,
        }
    }

    /// Readings with `from <= timestamp <= to`, oldest first.
    pub async fn readings_between(
        &self,
        greenhouse_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<SensorReading>> {
        match self {
            Store::Postgres(pool) => postgres::readings_between(pool, greenhouse_id, from, to).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.readings_between(greenhouse_id, from, to).await,
        }
    }

    /// Readings at or after `since` with `alert_count > 0`, newest first.
    pub async fn alerting_readings_since(
        &self,
        greenhouse_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SensorReading>> {
        match self {
            Store::Postgres(pool) => postgres::alerting_readings_since(pool, greenhouse_id, since).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.alerting_readings_since(greenhouse_id, since).await,
        }
    }

    /// Distinct greenhouse ids seen in the reading stream.
    pub async fn greenhouse_ids(&self) -> StoreResult<BTreeSet<String>> {
        match self {
            Store::Postgres(pool) => postgres::greenhouse_ids(pool).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.greenhouse_ids().await,
        }
    }

    /// Most recent command for one actuator of one greenhouse.
    pub async fn latest_command(
        &self,
        greenhouse_id: &str,
        actuator: ActuatorKind,
    ) -> StoreResult<Option<ActuatorCommand>> {
        match self {
            Store::Postgres(pool) => postgres::latest_command(pool, greenhouse_id, actuator).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.latest_command(greenhouse_id, actuator).await,
        }
    }

    /// Commands with `from <= timestamp <= to`, newest first.
    pub async fn commands_between(
        &self,
        greenhouse_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ActuatorCommand>> {
        match self {
            Store::Postgres(pool) => postgres::commands_between(pool, greenhouse_id, from, to).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.commands_between(greenhouse_id, from, to).await,
        }
    }

    pub async fn append_command(&self, command: &ActuatorCommand) -> StoreResult<()> {
        match self {
            Store::Postgres(pool) => postgres::append_command(pool, command).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.append_command(command).await,
        }
    }

    /// The persisted threshold record, or `None` if it was never written.
    pub async fn load_thresholds(&self) -> StoreResult<Option<ThresholdConfig>> {
        match self {
            Store::Postgres(pool) => postgres::load_thresholds(pool).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.load_thresholds().await,
        }
    }

    pub async fn save_thresholds(&self, config: &ThresholdConfig) -> StoreResult<()> {
        match self {
            Store::Postgres(pool) => postgres::save_thresholds(pool, config).await,
            #[cfg(test)]
            Store::Memory(mem) => mem.save_thresholds(config).await,
        }
    }
}
