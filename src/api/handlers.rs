use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{
        AlertParams, AlertsResponse, EndpointList, GreenhouseParams, GreenhousesResponse,
        HistoryResponse, ManualControlRequest, ServiceInfo, ThresholdsResponse, WindowParams,
    },
    errors::AppError,
    AppState,
};
use crate::{
    control::{
        engine::{FanDecision, PumpDecision, SensorInputs},
        fleet::{FleetEntry, FleetFailure, FleetReport},
        service::{
            ActuatorStatus, CommandHistory, CycleOutcome, DecisionReport, ManualControlResult,
            NoSensorData, StatusReport,
        },
        thresholds::{SoilMoisturePatch, TemperaturePatch, ThresholdPatch, ThresholdUpdate},
        Decision,
    },
    db::models::{
        ActuatorCommand, ActuatorKind, Controller, FanSpeed, PowerState, SensorReading,
        SensorValue, SoilMoistureThresholds, TemperatureThresholds, ThresholdConfig,
    },
    sensors::service::{SensorStats, Statistics, StatsSummary},
};

const DEFAULT_HISTORY_HOURS: u32 = 6;
const DEFAULT_STATS_HOURS: u32 = 24;
const DEFAULT_COMMAND_HISTORY_HOURS: u32 = 24;
const DEFAULT_ALERT_LIMIT: usize = 10;

fn greenhouse_id(state: &AppState, requested: Option<String>) -> String {
    requested
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| state.default_greenhouse_id.clone())
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON in request body: {}", e.body_text())))
}

// ---------------------------------------------------------------------------
// Sensor data
// ---------------------------------------------------------------------------

/// Most recent reading for a greenhouse.
#[utoipa::path(
    get,
    path = "/latest",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID (defaults to the configured one)"),
    ),
    responses(
        (status = 200, description = "Latest reading", body = SensorReading),
        (status = 404, description = "No reading found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_latest_reading(
    State(state): State<AppState>,
    Query(params): Query<GreenhouseParams>,
) -> Result<Json<SensorReading>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    state
        .sensors
        .latest(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No data found".into()))
}

/// Readings from the last `hours` hours (max 168), oldest first.
#[utoipa::path(
    get,
    path = "/history",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID"),
        ("hours" = Option<u32>, Query, description = "Window in hours (default 6, max 168)"),
    ),
    responses(
        (status = 200, description = "Reading history", body = HistoryResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_reading_history(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    let hours = params.hours.unwrap_or(DEFAULT_HISTORY_HOURS);
    let readings = state.sensors.history(&id, hours).await?;
    Ok(Json(HistoryResponse {
        count: readings.len(),
        readings,
    }))
}

/// Per-sensor statistics over the last `hours` hours.
#[utoipa::path(
    get,
    path = "/stats",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID"),
        ("hours" = Option<u32>, Query, description = "Window in hours (default 24)"),
    ),
    responses(
        (status = 200, description = "Statistics", body = Statistics),
        (status = 404, description = "No readings in window"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_statistics(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Statistics>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    let hours = params.hours.unwrap_or(DEFAULT_STATS_HOURS);
    state
        .sensors
        .statistics(&id, hours)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No data found".into()))
}

/// Alerts from the last 24 hours, newest first.
#[utoipa::path(
    get,
    path = "/alerts",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID"),
        ("limit" = Option<usize>, Query, description = "Maximum number of alerts (default 10)"),
    ),
    responses(
        (status = 200, description = "Recent alerts", body = AlertsResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertParams>,
) -> Result<Json<AlertsResponse>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    let limit = params.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    let alerts = state.sensors.alerts(&id, limit).await?;
    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

/// Every greenhouse id seen in the reading stream, sorted.
#[utoipa::path(
    get,
    path = "/greenhouses",
    responses(
        (status = 200, description = "Greenhouse ids", body = GreenhousesResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn list_greenhouses(
    State(state): State<AppState>,
) -> Result<Json<GreenhousesResponse>, AppError> {
    let greenhouses = state.sensors.greenhouse_ids().await?.into_iter().collect();
    Ok(Json(GreenhousesResponse { greenhouses }))
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Latest state per actuator plus the thresholds in force.
#[utoipa::path(
    get,
    path = "/actuators/status",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID"),
    ),
    responses(
        (status = 200, description = "Actuator status", body = StatusReport),
        (status = 500, description = "Internal server error"),
    ),
    tag = "actuators"
)]
pub async fn get_actuator_status(
    State(state): State<AppState>,
    Query(params): Query<GreenhouseParams>,
) -> Result<Json<StatusReport>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    let report = state.control.status(&id).await.map_err(AppError::from_control)?;
    Ok(Json(report))
}

/// Commands from the last `hours` hours, newest first.
#[utoipa::path(
    get,
    path = "/actuators/history",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID"),
        ("hours" = Option<u32>, Query, description = "Window in hours (default 24)"),
    ),
    responses(
        (status = 200, description = "Command history", body = CommandHistory),
        (status = 500, description = "Internal server error"),
    ),
    tag = "actuators"
)]
pub async fn get_actuator_history(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<CommandHistory>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    let hours = params.hours.unwrap_or(DEFAULT_COMMAND_HISTORY_HOURS);
    let history = state.control.history(&id, hours).await.map_err(AppError::from_control)?;
    Ok(Json(history))
}

/// Run one decision cycle for a greenhouse now.
#[utoipa::path(
    post,
    path = "/actuators/control",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID"),
    ),
    responses(
        (status = 200, description = "Decision report, or a no-data notice", body = CycleOutcome),
        (status = 500, description = "Internal server error"),
    ),
    tag = "actuators"
)]
pub async fn run_decision_cycle(
    State(state): State<AppState>,
    Query(params): Query<GreenhouseParams>,
) -> Result<Json<CycleOutcome>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    let outcome = state.control.run_cycle(&id).await.map_err(AppError::from_control)?;
    Ok(Json(outcome))
}

/// Set an actuator by hand, bypassing the thresholds.
#[utoipa::path(
    post,
    path = "/actuators/manual",
    params(
        ("greenhouse_id" = Option<String>, Query, description = "Greenhouse ID"),
    ),
    request_body = ManualControlRequest,
    responses(
        (status = 200, description = "Command stored", body = ManualControlResult),
        (status = 400, description = "Invalid actuator, state, speed or body"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "actuators"
)]
pub async fn manual_control(
    State(state): State<AppState>,
    Query(params): Query<GreenhouseParams>,
    payload: Result<Json<ManualControlRequest>, JsonRejection>,
) -> Result<Json<ManualControlResult>, AppError> {
    let id = greenhouse_id(&state, params.greenhouse_id);
    let body = json_body(payload)?;

    let (Some(actuator), Some(actuator_state)) = (body.actuator, body.state) else {
        return Err(AppError::BadRequest("Missing actuator or state".into()));
    };

    let result = state
        .control
        .manual_control(&id, &actuator, &actuator_state, body.speed.as_deref())
        .await
        .map_err(AppError::from_control)?;
    Ok(Json(result))
}

/// Current thresholds.
#[utoipa::path(
    get,
    path = "/actuators/thresholds",
    responses(
        (status = 200, description = "Threshold configuration", body = ThresholdsResponse),
    ),
    tag = "actuators"
)]
pub async fn get_thresholds(State(state): State<AppState>) -> Json<ThresholdsResponse> {
    Json(ThresholdsResponse {
        thresholds: state.control.thresholds().load().await,
    })
}

/// Merge a partial threshold config into the stored one.
#[utoipa::path(
    post,
    path = "/actuators/thresholds",
    request_body = ThresholdPatch,
    responses(
        (status = 200, description = "Merged thresholds; `success` is false if saving failed", body = ThresholdUpdate),
        (status = 400, description = "Malformed body or thresholds out of order"),
    ),
    tag = "actuators"
)]
pub async fn update_thresholds(
    State(state): State<AppState>,
    payload: Result<Json<ThresholdPatch>, JsonRejection>,
) -> Result<Json<ThresholdUpdate>, AppError> {
    let patch = json_body(payload)?;
    let result = state
        .control
        .thresholds()
        .update(&patch)
        .await
        .map_err(AppError::from_control)?;
    Ok(Json(result))
}

/// Run a decision cycle for every greenhouse, as the scheduler does.
#[utoipa::path(
    post,
    path = "/actuators/run-all",
    responses(
        (status = 200, description = "Per-greenhouse results", body = FleetReport),
        (status = 500, description = "Internal server error"),
    ),
    tag = "actuators"
)]
pub async fn run_fleet_cycle(State(state): State<AppState>) -> Result<Json<FleetReport>, AppError> {
    let report = state.fleet.run_all().await.map_err(AppError::from_control)?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Service name, version and endpoint overview.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo),
    ),
    tag = "system"
)]
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let automation = match state.automation_interval_secs {
        Some(secs) => format!("Scheduled every {secs} seconds"),
        None => "Disabled".to_owned(),
    };

    Json(ServiceInfo {
        service: "Greenhouse Control API".into(),
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        endpoints: EndpointList {
            sensors: ["/latest", "/history", "/stats", "/alerts", "/greenhouses"]
                .map(String::from)
                .to_vec(),
            actuators: [
                "/actuators/status",
                "/actuators/history",
                "/actuators/control (POST)",
                "/actuators/manual (POST)",
                "/actuators/thresholds",
                "/actuators/run-all (POST)",
            ]
            .map(String::from)
            .to_vec(),
        },
        automation,
    })
}

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_latest_reading, get_reading_history, get_statistics, get_alerts, list_greenhouses,
        get_actuator_status, get_actuator_history, run_decision_cycle, manual_control,
        get_thresholds, update_thresholds, run_fleet_cycle, service_info, health,
    ),
    components(schemas(
        SensorReading, SensorValue, Statistics, SensorStats, StatsSummary,
        HistoryResponse, AlertsResponse, GreenhousesResponse,
        ActuatorKind, PowerState, FanSpeed, Controller, ActuatorCommand,
        ThresholdConfig, SoilMoistureThresholds, TemperatureThresholds, ThresholdsResponse,
        ThresholdPatch, SoilMoisturePatch, TemperaturePatch, ThresholdUpdate,
        SensorInputs, PumpDecision, FanDecision, Decision, DecisionReport, NoSensorData, CycleOutcome,
        ActuatorStatus, StatusReport, CommandHistory, ManualControlRequest, ManualControlResult,
        FleetEntry, FleetFailure, FleetReport, ServiceInfo, EndpointList,
    )),
    tags(
        (name = "sensors",   description = "Sensor reading endpoints"),
        (name = "actuators", description = "Actuator decision and control endpoints"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Greenhouse Control API",
        version = "0.1.0",
        description = "Threshold-driven pump and fan control for greenhouse sensor data"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
