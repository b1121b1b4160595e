//! Threshold policy for the water pump and the cooling fan.
//!
//! Both actuators have a dead zone between their "turn on" and "turn off"
//! thresholds in which the current state is held. A reading sitting on a
//! boundary therefore never flips the actuator back and forth between cycles.
//!
//! | Actuator | Sensor        | ON when                   | OFF when           | Hold band              |
//! |----------|---------------|---------------------------|--------------------|------------------------|
//! | Pump     | soil_moisture | `v < turn_on`             | `v >= turn_off`    | `turn_on..turn_off`    |
//! | Fan HIGH | temperature   | `v >= turn_on_high`       | -                  | -                      |
//! | Fan LOW  | temperature   | `v >= turn_on_low`        | -                  | -                      |
//! | Fan      | temperature   | -                         | `v < turn_off`     | `turn_off..turn_on_low`|

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::tracker::ActuatorState;
use crate::db::models::{ActuatorKind, FanSpeed, PowerState, SensorReading, ThresholdConfig};

pub const SOIL_MOISTURE: &str = "soil_moisture";
pub const TEMPERATURE: &str = "temperature";

/// Assumed when the reading has no soil moisture value (inside the hold band).
pub const DEFAULT_SOIL_MOISTURE: f64 = 50.0;
/// Assumed when the reading has no temperature value (inside the hold band).
pub const DEFAULT_TEMPERATURE: f64 = 25.0;

/// The two sensor values the policy looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SensorInputs {
    pub soil_moisture: f64,
    pub temperature: f64,
}

impl SensorInputs {
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self {
            soil_moisture: reading
                .sensor_value(SOIL_MOISTURE)
                .unwrap_or(DEFAULT_SOIL_MOISTURE),
            temperature: reading
                .sensor_value(TEMPERATURE)
                .unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PumpDecision {
    pub previous_state: PowerState,
    pub new_state: PowerState,
    pub reason: String,
}

impl PumpDecision {
    pub fn changed(&self) -> bool {
        self.new_state != self.previous_state
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FanDecision {
    pub previous_state: PowerState,
    pub previous_speed: FanSpeed,
    pub new_state: PowerState,
    pub new_speed: FanSpeed,
    pub reason: String,
}

impl FanDecision {
    pub fn changed(&self) -> bool {
        self.new_state != self.previous_state || self.new_speed != self.previous_speed
    }
}

/// A command the engine wants persisted. Identity, timestamp and provenance
/// are attached by the [`CommandSink`](super::CommandSink).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub actuator: ActuatorKind,
    pub state: PowerState,
    pub speed: Option<FanSpeed>,
    pub reason: String,
    pub sensor_values: BTreeMap<String, f64>,
}

/// Outcome of one policy evaluation for one greenhouse.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Decision {
    pub water_pump: PumpDecision,
    pub cooling_fan: FanDecision,
    /// Zero, one or two commands; one per actuator whose state changed.
    #[serde(skip)]
    pub commands: Vec<PendingCommand>,
}

pub fn decide_pump(soil_moisture: f64, thresholds: &ThresholdConfig, current: PowerState) -> PumpDecision {
    let t = &thresholds.soil_moisture;

    let (new_state, reason) = if soil_moisture < t.turn_on {
        (
            PowerState::On,
            format!("Soil moisture low: {soil_moisture}% (threshold: {}%)", t.turn_on),
        )
    } else if soil_moisture >= t.turn_off {
        (
            PowerState::Off,
            format!("Soil moisture sufficient: {soil_moisture}% (threshold: {}%)", t.turn_off),
        )
    } else {
        (
            current,
            format!(
                "Soil moisture in range: {soil_moisture}% (band: {}%..{}%) - maintaining {current}",
                t.turn_on, t.turn_off
            ),
        )
    };

    PumpDecision {
        previous_state: current,
        new_state,
        reason,
    }
}

pub fn decide_fan(temperature: f64, thresholds: &ThresholdConfig, current: ActuatorState) -> FanDecision {
    let t = &thresholds.temperature;

    let (new_state, new_speed, reason) = if temperature >= t.turn_on_high {
        (
            PowerState::On,
            FanSpeed::High,
            format!("Temperature critical: {temperature}°C (threshold: {}°C)", t.turn_on_high),
        )
    } else if temperature >= t.turn_on_low {
        (
            PowerState::On,
            FanSpeed::Low,
            format!("Temperature high: {temperature}°C (threshold: {}°C)", t.turn_on_low),
        )
    } else if temperature < t.turn_off {
        (
            PowerState::Off,
            FanSpeed::Off,
            format!("Temperature normal: {temperature}°C (threshold: {}°C)", t.turn_off),
        )
    } else {
        (
            current.state,
            current.speed,
            format!(
                "Temperature acceptable: {temperature}°C (band: {}°C..{}°C) - maintaining {} @ {}",
                t.turn_off, t.turn_on_low, current.state, current.speed
            ),
        )
    };

    FanDecision {
        previous_state: current.state,
        previous_speed: current.speed,
        new_state,
        new_speed,
        reason,
    }
}

/// Evaluate both actuators against `thresholds`.
///
/// Pure: no I/O, no clock. A command is produced only for an actuator whose
/// new state (or, for the fan, speed) differs from its current one.
pub fn decide(
    inputs: SensorInputs,
    thresholds: &ThresholdConfig,
    pump_current: ActuatorState,
    fan_current: ActuatorState,
) -> Decision {
    let water_pump = decide_pump(inputs.soil_moisture, thresholds, pump_current.state);
    let cooling_fan = decide_fan(inputs.temperature, thresholds, fan_current);

    let mut commands = Vec::with_capacity(2);

    if water_pump.changed() {
        commands.push(PendingCommand {
            actuator: ActuatorKind::WaterPump,
            state: water_pump.new_state,
            speed: None,
            reason: water_pump.reason.clone(),
            sensor_values: BTreeMap::from([(SOIL_MOISTURE.to_owned(), inputs.soil_moisture)]),
        });
    }

    if cooling_fan.changed() {
        commands.push(PendingCommand {
            actuator: ActuatorKind::CoolingFan,
            state: cooling_fan.new_state,
            speed: Some(cooling_fan.new_speed),
            reason: cooling_fan.reason.clone(),
            sensor_values: BTreeMap::from([(TEMPERATURE.to_owned(), inputs.temperature)]),
        });
    }

    Decision {
        water_pump,
        cooling_fan,
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off() -> ActuatorState {
        ActuatorState::default()
    }

    fn fan(state: PowerState, speed: FanSpeed) -> ActuatorState {
        ActuatorState { state, speed }
    }

    fn pump(state: PowerState) -> ActuatorState {
        ActuatorState { state, speed: FanSpeed::Off }
    }

    fn defaults() -> ThresholdConfig {
        ThresholdConfig::default()
    }

    // -----------------------------------------------------------------------
    // Water pump
    // -----------------------------------------------------------------------

    #[test]
    fn pump_turns_on_below_turn_on() {
        let d = decide_pump(29.9, &defaults(), PowerState::Off);
        assert_eq!(d.new_state, PowerState::On);
        assert!(d.changed());
    }

    #[test]
    fn pump_exactly_at_turn_on_is_not_forced_on() {
        let d = decide_pump(30.0, &defaults(), PowerState::Off);
        assert_eq!(d.new_state, PowerState::Off);
        assert!(!d.changed());
    }

    #[test]
    fn pump_exactly_at_turn_off_is_forced_off() {
        let d = decide_pump(65.0, &defaults(), PowerState::On);
        assert_eq!(d.new_state, PowerState::Off);
        assert!(d.changed());
    }

    #[test]
    fn pump_holds_on_inside_band() {
        let d = decide_pump(50.0, &defaults(), PowerState::On);
        assert_eq!(d.new_state, PowerState::On);
        assert!(!d.changed());
        assert!(d.reason.contains("maintaining ON"));
    }

    #[test]
    fn pump_holds_off_inside_band() {
        let d = decide_pump(64.99, &defaults(), PowerState::Off);
        assert_eq!(d.new_state, PowerState::Off);
    }

    #[test]
    fn pump_reason_names_value_and_threshold() {
        let d = decide_pump(20.0, &defaults(), PowerState::Off);
        assert_eq!(d.reason, "Soil moisture low: 20% (threshold: 30%)");

        let d = decide_pump(70.5, &defaults(), PowerState::On);
        assert_eq!(d.reason, "Soil moisture sufficient: 70.5% (threshold: 65%)");
    }

    // -----------------------------------------------------------------------
    // Cooling fan
    // -----------------------------------------------------------------------

    #[test]
    fn fan_exactly_at_turn_on_high_runs_high() {
        let d = decide_fan(35.0, &defaults(), off());
        assert_eq!((d.new_state, d.new_speed), (PowerState::On, FanSpeed::High));
    }

    #[test]
    fn fan_exactly_at_turn_on_low_runs_low() {
        let d = decide_fan(30.0, &defaults(), off());
        assert_eq!((d.new_state, d.new_speed), (PowerState::On, FanSpeed::Low));
    }

    #[test]
    fn fan_just_below_turn_on_high_runs_low() {
        let d = decide_fan(34.99, &defaults(), fan(PowerState::On, FanSpeed::High));
        assert_eq!((d.new_state, d.new_speed), (PowerState::On, FanSpeed::Low));
        assert!(d.changed());
    }

    #[test]
    fn fan_exactly_at_turn_off_is_not_forced_off() {
        let d = decide_fan(25.0, &defaults(), fan(PowerState::On, FanSpeed::Low));
        assert_eq!((d.new_state, d.new_speed), (PowerState::On, FanSpeed::Low));
        assert!(!d.changed());
    }

    #[test]
    fn fan_just_below_turn_off_is_off() {
        let d = decide_fan(24.99, &defaults(), fan(PowerState::On, FanSpeed::Low));
        assert_eq!((d.new_state, d.new_speed), (PowerState::Off, FanSpeed::Off));
        assert!(d.changed());
    }

    #[test]
    fn fan_holds_inside_band() {
        let current = fan(PowerState::On, FanSpeed::High);
        let d = decide_fan(27.0, &defaults(), current);
        assert_eq!((d.new_state, d.new_speed), (PowerState::On, FanSpeed::High));
        assert!(!d.changed());
        assert!(d.reason.contains("maintaining ON @ HIGH"));
    }

    #[test]
    fn fan_speed_change_alone_counts_as_change() {
        let d = decide_fan(36.0, &defaults(), fan(PowerState::On, FanSpeed::Low));
        assert_eq!(d.new_state, d.previous_state);
        assert!(d.changed());
    }

    #[test]
    fn fan_reason_names_value_and_threshold() {
        let d = decide_fan(36.0, &defaults(), off());
        assert_eq!(d.reason, "Temperature critical: 36°C (threshold: 35°C)");
    }

    // -----------------------------------------------------------------------
    // Combined
    // -----------------------------------------------------------------------

    #[test]
    fn dry_and_hot_emits_two_commands() {
        let inputs = SensorInputs { soil_moisture: 20.0, temperature: 36.0 };
        let d = decide(inputs, &defaults(), off(), off());

        assert_eq!(d.water_pump.new_state, PowerState::On);
        assert_eq!(d.cooling_fan.new_state, PowerState::On);
        assert_eq!(d.cooling_fan.new_speed, FanSpeed::High);
        assert_eq!(d.commands.len(), 2);

        assert_eq!(d.commands[0].actuator, ActuatorKind::WaterPump);
        assert_eq!(d.commands[0].speed, None);
        assert_eq!(d.commands[0].sensor_values[SOIL_MOISTURE], 20.0);

        assert_eq!(d.commands[1].actuator, ActuatorKind::CoolingFan);
        assert_eq!(d.commands[1].speed, Some(FanSpeed::High));
        assert_eq!(d.commands[1].sensor_values[TEMPERATURE], 36.0);
    }

    #[test]
    fn matching_state_emits_nothing() {
        let inputs = SensorInputs { soil_moisture: 20.0, temperature: 36.0 };
        let d = decide(
            inputs,
            &defaults(),
            pump(PowerState::On),
            fan(PowerState::On, FanSpeed::High),
        );
        assert!(d.commands.is_empty());
    }

    #[test]
    fn missing_sensors_fall_in_hold_bands() {
        let reading: SensorReading = serde_json::from_value(serde_json::json!({
            "greenhouse_id": "gh1",
            "timestamp": "2026-10-19T10:00:00Z",
            "sensors": {},
            "alert_count": 0,
            "alerts": []
        }))
        .unwrap();
        let inputs = SensorInputs::from_reading(&reading);
        assert_eq!(inputs.soil_moisture, DEFAULT_SOIL_MOISTURE);
        assert_eq!(inputs.temperature, DEFAULT_TEMPERATURE);

        let d = decide(inputs, &defaults(), off(), off());
        assert!(d.commands.is_empty());
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let mut t = defaults();
        t.soil_moisture.turn_on = 40.0;
        let d = decide_pump(35.0, &t, PowerState::Off);
        assert_eq!(d.new_state, PowerState::On);
    }
}
