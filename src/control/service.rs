use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use super::{
    commands::CommandSink,
    engine::{decide, Decision, SensorInputs},
    thresholds::ThresholdStore,
    tracker::ActuatorStateTracker,
    ControlError,
};
use crate::{
    db::{
        models::{ActuatorCommand, ActuatorKind, Controller, FanSpeed, PowerState, ThresholdConfig},
        Store,
    },
    locks::GreenhouseLocks,
    sensors::MAX_HISTORY_HOURS,
};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of one decision cycle that had a reading to work with.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DecisionReport {
    pub greenhouse_id: String,
    /// Timestamp of the reading the decision was based on.
    pub timestamp: DateTime<Utc>,
    pub sensor_values: SensorInputs,
    pub decisions: Decision,
    /// Commands actually persisted.
    pub commands_sent: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NoSensorData {
    pub greenhouse_id: String,
    pub error: String,
    pub commands_sent: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CycleOutcome {
    Decided(DecisionReport),
    NoData(NoSensorData),
}

impl CycleOutcome {
    pub fn commands_sent(&self) -> usize {
        match self {
            CycleOutcome::Decided(r) => r.commands_sent,
            CycleOutcome::NoData(_) => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActuatorStatus {
    pub name: ActuatorKind,
    pub state: PowerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<FanSpeed>,
    pub last_updated: DateTime<Utc>,
    pub reason: String,
    pub sensor_values: BTreeMap<String, f64>,
    pub controller: Controller,
}

impl From<ActuatorCommand> for ActuatorStatus {
    fn from(c: ActuatorCommand) -> Self {
        Self {
            name: c.actuator,
            state: c.state,
            speed: c.speed,
            last_updated: c.timestamp,
            reason: c.reason,
            sensor_values: c.sensor_values,
            controller: c.controller,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusReport {
    pub greenhouse_id: String,
    /// Only actuators that have received at least one command.
    pub actuators: Vec<ActuatorStatus>,
    pub count: usize,
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommandHistory {
    pub greenhouse_id: String,
    /// Newest first.
    pub commands: Vec<ActuatorCommand>,
    pub count: usize,
    pub hours: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ManualControlResult {
    pub success: bool,
    pub message: String,
    pub command: ActuatorCommand,
}

// ---------------------------------------------------------------------------
// ControlService
// ---------------------------------------------------------------------------

/// Runs decision cycles and serves actuator state for one greenhouse at a
/// time. Cheap to clone; clones share the per-greenhouse locks.
#[derive(Clone)]
pub struct ControlService {
    store: Store,
    thresholds: ThresholdStore,
    tracker: ActuatorStateTracker,
    sink: CommandSink,
    locks: GreenhouseLocks,
}

impl ControlService {
    pub fn new(store: Store) -> Self {
        Self {
            thresholds: ThresholdStore::new(store.clone()),
            tracker: ActuatorStateTracker::new(store.clone()),
            sink: CommandSink::new(store.clone()),
            locks: GreenhouseLocks::new(),
            store,
        }
    }

    pub fn thresholds(&self) -> &ThresholdStore {
        &self.thresholds
    }

    /// One decision cycle: load thresholds, read the latest reading and the
    /// current actuator states, decide, and persist a command per change.
    ///
    /// Holds the greenhouse lock for the whole read-decide-write sequence.
    /// Failing to read the latest reading is an error; failing to store a
    /// command is logged and the command is left out of `commands_sent`.
    pub async fn run_cycle(&self, greenhouse_id: &str) -> Result<CycleOutcome, ControlError> {
        let _guard = self.locks.acquire(greenhouse_id).await;

        let thresholds = self.thresholds.load().await;

        let Some(reading) = self.store.latest_reading(greenhouse_id).await? else {
            info!(greenhouse_id = %greenhouse_id, "No sensor data; skipping decision");
            return Ok(CycleOutcome::NoData(NoSensorData {
                greenhouse_id: greenhouse_id.to_owned(),
                error: "No sensor data available".into(),
                commands_sent: 0,
            }));
        };

        let inputs = SensorInputs::from_reading(&reading);
        let pump_current = self.tracker.current(greenhouse_id, ActuatorKind::WaterPump).await;
        let fan_current = self.tracker.current(greenhouse_id, ActuatorKind::CoolingFan).await;

        let mut decision = decide(inputs, &thresholds, pump_current, fan_current);

        let fan = &decision.cooling_fan;
        let fan_from = format!("{}@{}", fan.previous_state, fan.previous_speed);
        let fan_to = format!("{}@{}", fan.new_state, fan.new_speed);
        info!(
            greenhouse_id = %greenhouse_id,
            soil_moisture = inputs.soil_moisture,
            pump_from = %decision.water_pump.previous_state,
            pump_to = %decision.water_pump.new_state,
            temperature = inputs.temperature,
            fan_from = %fan_from,
            fan_to = %fan_to,
            "Decision made"
        );

        let mut commands_sent = 0;
        for pending in std::mem::take(&mut decision.commands) {
            if self.sink.store(greenhouse_id, pending, Controller::Auto).await.is_ok() {
                commands_sent += 1;
            }
        }

        info!(greenhouse_id = %greenhouse_id, commands_sent, "Decision cycle complete");

        Ok(CycleOutcome::Decided(DecisionReport {
            greenhouse_id: greenhouse_id.to_owned(),
            timestamp: reading.timestamp,
            sensor_values: inputs,
            decisions: decision,
            commands_sent,
        }))
    }

    /// Latest command per actuator plus the thresholds in force.
    pub async fn status(&self, greenhouse_id: &str) -> Result<StatusReport, ControlError> {
        let mut actuators = Vec::with_capacity(ActuatorKind::ALL.len());
        for actuator in ActuatorKind::ALL {
            if let Some(command) = self.tracker.latest(greenhouse_id, actuator).await? {
                actuators.push(ActuatorStatus::from(command));
            }
        }

        Ok(StatusReport {
            greenhouse_id: greenhouse_id.to_owned(),
            count: actuators.len(),
            actuators,
            thresholds: self.thresholds.load().await,
        })
    }

    /// Commands from the last `hours` hours (capped at `MAX_HISTORY_HOURS`),
    /// newest first.
    pub async fn history(&self, greenhouse_id: &str, hours: u32) -> Result<CommandHistory, ControlError> {
        let hours = hours.min(MAX_HISTORY_HOURS);
        let to = Utc::now();
        let from = to - Duration::hours(i64::from(hours));
        let commands = self.store.commands_between(greenhouse_id, from, to).await?;

        Ok(CommandHistory {
            greenhouse_id: greenhouse_id.to_owned(),
            count: commands.len(),
            commands,
            hours,
        })
    }

    /// Store an operator command, bypassing the policy.
    pub async fn manual_control(
        &self,
        greenhouse_id: &str,
        actuator: &str,
        state: &str,
        speed: Option<&str>,
    ) -> Result<ManualControlResult, ControlError> {
        let _guard = self.locks.acquire(greenhouse_id).await;

        let command = self
            .sink
            .manual_override(greenhouse_id, actuator, state, speed)
            .await?;

        Ok(ManualControlResult {
            success: true,
            message: format!("{} set to {}", command.actuator, command.state),
            command,
        })
    }
}
