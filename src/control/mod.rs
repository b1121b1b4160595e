pub mod commands;
pub mod engine;
pub mod fleet;
pub mod service;
pub mod thresholds;
pub mod tracker;

use crate::db::StoreError;

pub use self::{
    commands::CommandSink,
    engine::{decide, Decision},
    fleet::FleetProcessor,
    service::ControlService,
    thresholds::ThresholdStore,
    tracker::{ActuatorState, ActuatorStateTracker},
};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Invalid actuator: {0}. Must be one of [water_pump, cooling_fan]")]
    InvalidActuator(String),
    #[error("Invalid state: {0}. Must be one of [ON, OFF]")]
    InvalidState(String),
    #[error("Invalid speed: {0}. Must be one of [OFF, LOW, HIGH]")]
    InvalidSpeed(String),
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ControlError {
    /// `true` for errors caused by caller input rather than storage.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ControlError::Store(_))
    }
}
