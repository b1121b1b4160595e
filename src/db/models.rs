use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Decimal places kept for every number the service persists
/// (thresholds and command sensor values).
pub const STORED_PRECISION: i32 = 4;

/// Round `value` to `places` decimal digits.
///
/// e.g. `round_to(30.123456, 4)` → `30.1235`, `round_to(21.456, 2)` → `21.46`
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Enums (mirror the Postgres enum types)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "actuator_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    WaterPump,
    CoolingFan,
}

impl ActuatorKind {
    pub const ALL: [ActuatorKind; 2] = [ActuatorKind::WaterPump, ActuatorKind::CoolingFan];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActuatorKind::WaterPump => "water_pump",
            ActuatorKind::CoolingFan => "cooling_fan",
        }
    }
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "power_state", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    #[default]
    Off,
}

impl PowerState {
    pub const ALL: [PowerState; 2] = [PowerState::On, PowerState::Off];

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooling fan speed. The water pump has no speed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "fan_speed", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FanSpeed {
    #[default]
    Off,
    Low,
    High,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 3] = [FanSpeed::Off, FanSpeed::Low, FanSpeed::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            FanSpeed::Off => "OFF",
            FanSpeed::Low => "LOW",
            FanSpeed::High => "HIGH",
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag stored on every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "command_source")]
pub enum Controller {
    #[serde(rename = "api-auto")]
    #[sqlx(rename = "api-auto")]
    Auto,
    #[serde(rename = "api-manual")]
    #[sqlx(rename = "api-manual")]
    Manual,
}

// ---------------------------------------------------------------------------
// Sensor readings (written by the ingestion pipeline, read-only here)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorValue {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Free-form alert record produced by the ingestion pipeline.
pub type Alert = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct SensorReading {
    pub greenhouse_id: String,
    #[sqlx(rename = "recorded_at")]
    pub timestamp: DateTime<Utc>,
    #[sqlx(json)]
    pub sensors: BTreeMap<String, SensorValue>,
    pub alert_count: i32,
    #[sqlx(json)]
    #[schema(value_type = Vec<Object>)]
    pub alerts: Vec<Alert>,
}

impl SensorReading {
    pub fn sensor_value(&self, name: &str) -> Option<f64> {
        self.sensors.get(name).map(|s| s.value)
    }
}

// ---------------------------------------------------------------------------
// Actuator commands (append-only log)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct ActuatorCommand {
    pub id: Uuid,
    pub greenhouse_id: String,
    /// Generated when the command is written.
    #[sqlx(rename = "recorded_at")]
    pub timestamp: DateTime<Utc>,
    pub actuator: ActuatorKind,
    pub state: PowerState,
    /// Only set for the cooling fan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<FanSpeed>,
    pub reason: String,
    /// Sensor values the decision was based on, rounded to `STORED_PRECISION`.
    #[sqlx(json)]
    pub sensor_values: BTreeMap<String, f64>,
    pub controller: Controller,
}

// ---------------------------------------------------------------------------
// Thresholds (singleton configuration record)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SoilMoistureThresholds {
    /// Pump turns ON strictly below this (%).
    pub turn_on: f64,
    /// Pump turns OFF at or above this (%).
    pub turn_off: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemperatureThresholds {
    /// Fan runs LOW at or above this (°C).
    pub turn_on_low: f64,
    /// Fan runs HIGH at or above this (°C).
    pub turn_on_high: f64,
    /// Fan turns OFF strictly below this (°C).
    pub turn_off: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdConfig {
    pub soil_moisture: SoilMoistureThresholds,
    pub temperature: TemperatureThresholds,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            soil_moisture: SoilMoistureThresholds {
                turn_on: 30.0,
                turn_off: 65.0,
            },
            temperature: TemperatureThresholds {
                turn_on_low: 30.0,
                turn_on_high: 35.0,
                turn_off: 25.0,
            },
        }
    }
}

impl ThresholdConfig {
    /// Copy with every value rounded to `STORED_PRECISION`.
    pub fn rounded(&self) -> Self {
        let r = |v: f64| round_to(v, STORED_PRECISION);
        Self {
            soil_moisture: SoilMoistureThresholds {
                turn_on: r(self.soil_moisture.turn_on),
                turn_off: r(self.soil_moisture.turn_off),
            },
            temperature: TemperatureThresholds {
                turn_on_low: r(self.temperature.turn_on_low),
                turn_on_high: r(self.temperature.turn_on_high),
                turn_off: r(self.temperature.turn_off),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_four_places() {
        assert_eq!(round_to(30.123456, 4), 30.1235);
        assert_eq!(round_to(65.0, 4), 65.0);
    }

    #[test]
    fn round_to_two_places() {
        assert_eq!(round_to(21.456, 2), 21.46);
    }

    #[test]
    fn enums_serialize_to_wire_names() {
        assert_eq!(serde_json::to_value(ActuatorKind::CoolingFan).unwrap(), "cooling_fan");
        assert_eq!(serde_json::to_value(PowerState::On).unwrap(), "ON");
        assert_eq!(serde_json::to_value(FanSpeed::High).unwrap(), "HIGH");
        assert_eq!(serde_json::to_value(Controller::Manual).unwrap(), "api-manual");
    }

    #[test]
    fn default_thresholds_are_ordered() {
        let t = ThresholdConfig::default();
        assert!(t.soil_moisture.turn_on < t.soil_moisture.turn_off);
        assert!(t.temperature.turn_off < t.temperature.turn_on_low);
        assert!(t.temperature.turn_on_low < t.temperature.turn_on_high);
    }

    #[test]
    fn reading_without_unit_deserializes() {
        let r: SensorReading = serde_json::from_value(serde_json::json!({
            "greenhouse_id": "gh1",
            "timestamp": "2026-10-19T10:00:00Z",
            "sensors": { "temperature": { "value": 24.5 } },
            "alert_count": 0,
            "alerts": []
        }))
        .unwrap();
        assert_eq!(r.sensor_value("temperature"), Some(24.5));
        assert_eq!(r.sensor_value("soil_moisture"), None);
    }
}
