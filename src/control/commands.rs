use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use super::{engine::PendingCommand, ControlError};
use crate::db::{
    models::{round_to, ActuatorCommand, ActuatorKind, Controller, FanSpeed, PowerState, STORED_PRECISION},
    Store, StoreResult,
};

pub fn parse_actuator(raw: &str) -> Result<ActuatorKind, ControlError> {
    ActuatorKind::ALL
        .into_iter()
        .find(|a| a.as_str() == raw)
        .ok_or_else(|| ControlError::InvalidActuator(raw.to_owned()))
}

pub fn parse_state(raw: &str) -> Result<PowerState, ControlError> {
    PowerState::ALL
        .into_iter()
        .find(|s| s.as_str() == raw)
        .ok_or_else(|| ControlError::InvalidState(raw.to_owned()))
}

pub fn parse_speed(raw: &str) -> Result<FanSpeed, ControlError> {
    FanSpeed::ALL
        .into_iter()
        .find(|s| s.as_str() == raw)
        .ok_or_else(|| ControlError::InvalidSpeed(raw.to_owned()))
}

/// Appends commands to the log, stamping id, write time and provenance.
#[derive(Debug, Clone)]
pub struct CommandSink {
    store: Store,
}

impl CommandSink {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn store(
        &self,
        greenhouse_id: &str,
        pending: PendingCommand,
        controller: Controller,
    ) -> StoreResult<ActuatorCommand> {
        let command = ActuatorCommand {
            id: Uuid::new_v4(),
            greenhouse_id: greenhouse_id.to_owned(),
            timestamp: Utc::now(),
            actuator: pending.actuator,
            state: pending.state,
            speed: pending.speed,
            reason: pending.reason,
            sensor_values: pending
                .sensor_values
                .into_iter()
                .map(|(k, v)| (k, round_to(v, STORED_PRECISION)))
                .collect(),
            controller,
        };

        match self.store.append_command(&command).await {
            Ok(()) => {
                info!(
                    greenhouse_id = %greenhouse_id,
                    actuator = %command.actuator,
                    state = %command.state,
                    speed = ?command.speed,
                    controller = ?command.controller,
                    "Stored actuator command"
                );
                Ok(command)
            }
            Err(e) => {
                error!(
                    greenhouse_id = %greenhouse_id,
                    actuator = %command.actuator,
                    error = %e,
                    "Failed to store actuator command"
                );
                Err(e)
            }
        }
    }

    /// Validate and store an operator command. Thresholds are not consulted.
    ///
    /// The fan defaults to `LOW` when switched on without a speed; the pump
    /// never carries a speed.
    pub async fn manual_override(
        &self,
        greenhouse_id: &str,
        actuator: &str,
        state: &str,
        speed: Option<&str>,
    ) -> Result<ActuatorCommand, ControlError> {
        let actuator = parse_actuator(actuator)?;
        let state = parse_state(state)?;

        let speed = match actuator {
            ActuatorKind::WaterPump => None,
            ActuatorKind::CoolingFan => {
                let requested = speed.map(parse_speed).transpose()?;
                Some(match (state, requested) {
                    (PowerState::Off, _) => FanSpeed::Off,
                    (PowerState::On, Some(FanSpeed::Off) | None) => FanSpeed::Low,
                    (PowerState::On, Some(s)) => s,
                })
            }
        };

        let reason = match speed {
            Some(s) => format!("Manual control: {state} @ {s}"),
            None => format!("Manual control: {state}"),
        };

        let pending = PendingCommand {
            actuator,
            state,
            speed,
            reason,
            sensor_values: Default::default(),
        };

        self.store(greenhouse_id, pending, Controller::Manual)
            .await
            .map_err(ControlError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::db::memory::MemoryStore;

    fn sink() -> (MemoryStore, CommandSink) {
        let mem = MemoryStore::new();
        (mem.clone(), CommandSink::new(Store::Memory(mem)))
    }

    #[test]
    fn parse_accepts_wire_names() {
        assert_eq!(parse_actuator("water_pump").unwrap(), ActuatorKind::WaterPump);
        assert_eq!(parse_actuator("cooling_fan").unwrap(), ActuatorKind::CoolingFan);
        assert_eq!(parse_state("ON").unwrap(), PowerState::On);
        assert_eq!(parse_speed("HIGH").unwrap(), FanSpeed::High);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = parse_actuator("heater").unwrap_err();
        assert!(err.to_string().contains("Invalid actuator: heater"));
        assert!(parse_state("on").is_err());
        assert!(parse_speed("TURBO").is_err());
    }

    #[tokio::test]
    async fn store_stamps_provenance_and_rounds_values() {
        let (mem, sink) = sink();
        let pending = PendingCommand {
            actuator: ActuatorKind::WaterPump,
            state: PowerState::On,
            speed: None,
            reason: "Soil moisture low".into(),
            sensor_values: BTreeMap::from([("soil_moisture".to_owned(), 12.345678)]),
        };

        let stored = sink.store("gh1", pending, Controller::Auto).await.unwrap();
        assert_eq!(stored.controller, Controller::Auto);
        assert_eq!(stored.sensor_values["soil_moisture"], 12.3457);

        let all = mem.commands().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, stored.id);
    }

    #[tokio::test]
    async fn manual_override_rejects_unknown_actuator_and_stores_nothing() {
        let (mem, sink) = sink();
        let err = sink.manual_override("gh1", "heater", "ON", None).await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidActuator(_)));
        assert!(mem.commands().await.is_empty());
    }

    #[tokio::test]
    async fn manual_override_rejects_unknown_state() {
        let (mem, sink) = sink();
        let err = sink.manual_override("gh1", "water_pump", "MAYBE", None).await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidState(_)));
        assert!(mem.commands().await.is_empty());
    }

    #[tokio::test]
    async fn manual_override_is_tagged_manual() {
        let (_mem, sink) = sink();
        let cmd = sink
            .manual_override("gh1", "cooling_fan", "ON", Some("HIGH"))
            .await
            .unwrap();
        assert_eq!(cmd.controller, Controller::Manual);
        assert_eq!(cmd.speed, Some(FanSpeed::High));
        assert_eq!(cmd.reason, "Manual control: ON @ HIGH");
    }

    #[tokio::test]
    async fn manual_fan_speed_defaults() {
        let (_mem, sink) = sink();
        let on = sink.manual_override("gh1", "cooling_fan", "ON", None).await.unwrap();
        assert_eq!(on.speed, Some(FanSpeed::Low));

        let off = sink.manual_override("gh1", "cooling_fan", "OFF", Some("HIGH")).await.unwrap();
        assert_eq!(off.speed, Some(FanSpeed::Off));
    }

    #[tokio::test]
    async fn manual_pump_drops_speed() {
        let (_mem, sink) = sink();
        let cmd = sink.manual_override("gh1", "water_pump", "ON", Some("HIGH")).await.unwrap();
        assert_eq!(cmd.speed, None);
        assert_eq!(cmd.reason, "Manual control: ON");
    }

    #[tokio::test]
    async fn manual_pump_ignores_unknown_speed() {
        let (mem, sink) = sink();
        let cmd = sink.manual_override("gh1", "water_pump", "ON", Some("TURBO")).await.unwrap();
        assert_eq!(cmd.speed, None);
        assert_eq!(mem.commands().await.len(), 1);
    }

    #[tokio::test]
    async fn manual_fan_rejects_unknown_speed() {
        let (mem, sink) = sink();
        let err = sink.manual_override("gh1", "cooling_fan", "ON", Some("TURBO")).await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidSpeed(_)));
        assert!(mem.commands().await.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_is_returned() {
        let (mem, sink) = sink();
        mem.fail_greenhouse("gh1").await;
        let err = sink.manual_override("gh1", "water_pump", "OFF", None).await.unwrap_err();
        assert!(matches!(err, ControlError::Store(_)));
    }
}
