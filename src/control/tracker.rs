use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::db::{
    models::{ActuatorCommand, ActuatorKind, FanSpeed, PowerState},
    Store, StoreResult,
};

/// Current state of one actuator. `speed` is always `OFF` for the pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ActuatorState {
    pub state: PowerState,
    pub speed: FanSpeed,
}

impl From<&ActuatorCommand> for ActuatorState {
    fn from(c: &ActuatorCommand) -> Self {
        Self {
            state: c.state,
            speed: c.speed.unwrap_or_default(),
        }
    }
}

/// Derives actuator state from the command log: the state is whatever the
/// most recent command for that actuator said.
///
/// Lookups go through the `(greenhouse_id, actuator, recorded_at)` index, so
/// an actuator that changes rarely is found no matter how many commands the
/// other actuator has produced since.
#[derive(Debug, Clone)]
pub struct ActuatorStateTracker {
    store: Store,
}

impl ActuatorStateTracker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Latest command for `actuator`, if it ever received one.
    pub async fn latest(
        &self,
        greenhouse_id: &str,
        actuator: ActuatorKind,
    ) -> StoreResult<Option<ActuatorCommand>> {
        self.store.latest_command(greenhouse_id, actuator).await
    }

    /// Current state, `OFF`/`OFF` when there is no history or the lookup fails.
    pub async fn current(&self, greenhouse_id: &str, actuator: ActuatorKind) -> ActuatorState {
        match self.latest(greenhouse_id, actuator).await {
            Ok(Some(command)) => ActuatorState::from(&command),
            Ok(None) => ActuatorState::default(),
            Err(e) => {
                warn!(
                    greenhouse_id = %greenhouse_id,
                    actuator = %actuator,
                    error = %e,
                    "Failed to read actuator state; assuming OFF"
                );
                ActuatorState::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::db::{memory::MemoryStore, models::Controller};

    fn make_command(
        greenhouse_id: &str,
        actuator: ActuatorKind,
        state: PowerState,
        speed: Option<FanSpeed>,
        minutes_ago: i64,
    ) -> ActuatorCommand {
        ActuatorCommand {
            id: Uuid::new_v4(),
            greenhouse_id: greenhouse_id.to_owned(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            actuator,
            state,
            speed,
            reason: "test".into(),
            sensor_values: BTreeMap::new(),
            controller: Controller::Auto,
        }
    }

    #[tokio::test]
    async fn no_history_defaults_to_off() {
        let tracker = ActuatorStateTracker::new(Store::Memory(MemoryStore::new()));
        let s = tracker.current("gh1", ActuatorKind::CoolingFan).await;
        assert_eq!(s, ActuatorState::default());
        assert_eq!(s.state, PowerState::Off);
        assert_eq!(s.speed, FanSpeed::Off);
    }

    #[tokio::test]
    async fn returns_most_recent_matching_command() {
        let mem = MemoryStore::new();
        let store = Store::Memory(mem.clone());
        store
            .append_command(&make_command("gh1", ActuatorKind::CoolingFan, PowerState::On, Some(FanSpeed::High), 10))
            .await
            .unwrap();
        store
            .append_command(&make_command("gh1", ActuatorKind::CoolingFan, PowerState::On, Some(FanSpeed::Low), 5))
            .await
            .unwrap();
        store
            .append_command(&make_command("gh1", ActuatorKind::WaterPump, PowerState::On, None, 1))
            .await
            .unwrap();

        let tracker = ActuatorStateTracker::new(store);
        let fan = tracker.current("gh1", ActuatorKind::CoolingFan).await;
        assert_eq!(fan, ActuatorState { state: PowerState::On, speed: FanSpeed::Low });

        let pump = tracker.current("gh1", ActuatorKind::WaterPump).await;
        assert_eq!(pump.state, PowerState::On);
        assert_eq!(pump.speed, FanSpeed::Off);
    }

    #[tokio::test]
    async fn rare_actuator_is_found_behind_many_commands_of_the_other() {
        let store = Store::Memory(MemoryStore::new());
        store
            .append_command(&make_command("gh1", ActuatorKind::WaterPump, PowerState::On, None, 500))
            .await
            .unwrap();
        for i in 0..50 {
            let speed = if i % 2 == 0 { FanSpeed::Low } else { FanSpeed::High };
            store
                .append_command(&make_command("gh1", ActuatorKind::CoolingFan, PowerState::On, Some(speed), 100 - i))
                .await
                .unwrap();
        }

        let tracker = ActuatorStateTracker::new(store);
        assert_eq!(tracker.current("gh1", ActuatorKind::WaterPump).await.state, PowerState::On);
    }

    #[tokio::test]
    async fn other_greenhouses_are_ignored() {
        let store = Store::Memory(MemoryStore::new());
        store
            .append_command(&make_command("gh2", ActuatorKind::WaterPump, PowerState::On, None, 1))
            .await
            .unwrap();

        let tracker = ActuatorStateTracker::new(store);
        assert_eq!(tracker.current("gh1", ActuatorKind::WaterPump).await.state, PowerState::Off);
    }

    #[tokio::test]
    async fn storage_error_defaults_to_off() {
        let mem = MemoryStore::new();
        let store = Store::Memory(mem.clone());
        store
            .append_command(&make_command("gh1", ActuatorKind::WaterPump, PowerState::On, None, 1))
            .await
            .unwrap();
        mem.fail_greenhouse("gh1").await;

        let tracker = ActuatorStateTracker::new(store);
        assert_eq!(tracker.current("gh1", ActuatorKind::WaterPump).await, ActuatorState::default());
    }
}
