use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::{Alert, SensorReading, ThresholdConfig};

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GreenhouseParams {
    pub greenhouse_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub greenhouse_id: Option<String>,
    pub hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AlertParams {
    pub greenhouse_id: Option<String>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Request body for `POST /actuators/manual`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualControlRequest {
    /// `water_pump` or `cooling_fan`.
    pub actuator: Option<String>,
    /// `ON` or `OFF`.
    pub state: Option<String>,
    /// `OFF`, `LOW` or `HIGH`; cooling fan only.
    pub speed: Option<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Oldest first.
    pub readings: Vec<SensorReading>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertsResponse {
    /// Newest first; each alert carries `reading_timestamp`.
    #[schema(value_type = Vec<Object>)]
    pub alerts: Vec<Alert>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GreenhousesResponse {
    pub greenhouses: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThresholdsResponse {
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointList {
    pub sensors: Vec<String>,
    pub actuators: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub service: String,
    pub status: String,
    pub version: String,
    pub endpoints: EndpointList,
    pub automation: String,
}
