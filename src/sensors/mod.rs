pub mod service;

pub use service::{SensorService, MAX_HISTORY_HOURS};
