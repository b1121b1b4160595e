use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

use super::{
    models::{ActuatorCommand, ActuatorKind, SensorReading, ThresholdConfig},
    StoreResult,
};

/// Key of the threshold singleton in `controller_config`.
pub(super) const THRESHOLDS_KEY: &str = "__CONFIG__/thresholds";

const READING_COLUMNS: &str = "greenhouse_id, recorded_at, sensors, alert_count, alerts";

const COMMAND_COLUMNS: &str =
    "id, greenhouse_id, recorded_at, actuator, state, speed, reason, sensor_values, controller";

pub(super) async fn latest_reading(
    pool: &PgPool,
    greenhouse_id: &str,
) -> StoreResult<Option<SensorReading>> {
    let sql = format!(
        "SELECT {READING_COLUMNS} FROM sensor_readings \
         WHERE greenhouse_id = $1 \
         ORDER BY recorded_at DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, SensorReading>(&sql)
        .bind(greenhouse_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub(super) async fn readings_between(
    pool: &PgPool,
    greenhouse_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> StoreResult<Vec<SensorReading>> {
    let sql = format!(
        "SELECT {READING_COLUMNS} FROM sensor_readings \
         WHERE greenhouse_id = $1 \
           AND recorded_at BETWEEN $2 AND $3 \
         ORDER BY recorded_at ASC"
    );
    let rows = sqlx::query_as::<_, SensorReading>(&sql)
        .bind(greenhouse_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub(super) async fn alerting_readings_since(
    pool: &PgPool,
    greenhouse_id: &str,
    since: DateTime<Utc>,
) -> StoreResult<Vec<SensorReading>> {
    let sql = format!(
        "SELECT {READING_COLUMNS} FROM sensor_readings \
         WHERE greenhouse_id = $1 \
           AND recorded_at >= $2 \
           AND alert_count > 0 \
         ORDER BY recorded_at DESC"
    );
    let rows = sqlx::query_as::<_, SensorReading>(&sql)
        .bind(greenhouse_id)
        .bind(since)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub(super) async fn greenhouse_ids(pool: &PgPool) -> StoreResult<BTreeSet<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT greenhouse_id FROM sensor_readings ORDER BY greenhouse_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(ids.into_iter().collect())
}

pub(super) async fn latest_command(
    pool: &PgPool,
    greenhouse_id: &str,
    actuator: ActuatorKind,
) -> StoreResult<Option<ActuatorCommand>> {
    let sql = format!(
        "SELECT {COMMAND_COLUMNS} FROM actuator_commands \
         WHERE greenhouse_id = $1 \
           AND actuator = $2 \
         ORDER BY recorded_at DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, ActuatorCommand>(&sql)
        .bind(greenhouse_id)
        .bind(actuator)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub(super) async fn commands_between(
    pool: &PgPool,
    greenhouse_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> StoreResult<Vec<ActuatorCommand>> {
    let sql = format!(
        "SELECT {COMMAND_COLUMNS} FROM actuator_commands \
         WHERE greenhouse_id = $1 \
           AND recorded_at BETWEEN $2 AND $3 \
         ORDER BY recorded_at DESC"
    );
    let rows = sqlx::query_as::<_, ActuatorCommand>(&sql)
        .bind(greenhouse_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub(super) async fn append_command(pool: &PgPool, command: &ActuatorCommand) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO actuator_commands \
             (id, greenhouse_id, recorded_at, actuator, state, speed, reason, sensor_values, controller) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(command.id)
    .bind(&command.greenhouse_id)
    .bind(command.timestamp)
    .bind(command.actuator)
    .bind(command.state)
    .bind(command.speed)
    .bind(&command.reason)
    .bind(Json(&command.sensor_values))
    .bind(command.controller)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn load_thresholds(pool: &PgPool) -> StoreResult<Option<ThresholdConfig>> {
    let data: Option<serde_json::Value> =
        sqlx::query_scalar("SELECT data FROM controller_config WHERE config_key = $1")
            .bind(THRESHOLDS_KEY)
            .fetch_optional(pool)
            .await?;

    match data {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub(super) async fn save_thresholds(pool: &PgPool, config: &ThresholdConfig) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO controller_config (config_key, data, updated_at) \
         VALUES ($1, $2, now()) \
         ON CONFLICT (config_key) DO UPDATE \
         SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at",
    )
    .bind(THRESHOLDS_KEY)
    .bind(Json(config))
    .execute(pool)
    .await?;
    Ok(())
}
