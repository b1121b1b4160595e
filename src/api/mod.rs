pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    config::Config,
    control::{ControlService, FleetProcessor},
    db::Store,
    sensors::SensorService,
};

/// Shared handler state. Every field is a cheap clone over the same store.
#[derive(Clone)]
pub struct AppState {
    pub sensors: SensorService,
    pub control: ControlService,
    pub fleet: FleetProcessor,
    pub default_greenhouse_id: String,
    /// Period of the scheduled fleet cycle, `None` when it is disabled.
    pub automation_interval_secs: Option<u64>,
}

impl AppState {
    pub fn new(store: Store, config: &Config) -> Self {
        let sensors = SensorService::new(store.clone());
        let control = ControlService::new(store);
        let fleet = FleetProcessor::new(control.clone(), sensors.clone(), config.fleet_concurrency);
        Self {
            sensors,
            control,
            fleet,
            default_greenhouse_id: config.default_greenhouse_id.clone(),
            automation_interval_secs: config
                .automation_enabled
                .then_some(config.control_interval_secs),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/latest", get(handlers::get_latest_reading))
        .route("/history", get(handlers::get_reading_history))
        .route("/stats", get(handlers::get_statistics))
        .route("/alerts", get(handlers::get_alerts))
        .route("/greenhouses", get(handlers::list_greenhouses))
        .route("/actuators/status", get(handlers::get_actuator_status))
        .route("/actuators/history", get(handlers::get_actuator_history))
        .route("/actuators/control", post(handlers::run_decision_cycle))
        .route("/actuators/manual", post(handlers::manual_control))
        .route(
            "/actuators/thresholds",
            get(handlers::get_thresholds).post(handlers::update_thresholds),
        )
        .route("/actuators/run-all", post(handlers::run_fleet_cycle))
        .route("/", get(handlers::service_info))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
