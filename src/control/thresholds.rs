use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::ControlError;
use crate::db::{models::ThresholdConfig, Store};

// ---------------------------------------------------------------------------
// Partial update body
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct SoilMoisturePatch {
    pub turn_on: Option<f64>,
    pub turn_off: Option<f64>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemperaturePatch {
    pub turn_on_low: Option<f64>,
    pub turn_on_high: Option<f64>,
    pub turn_off: Option<f64>,
}

/// Request body for `POST /actuators/thresholds`. Absent fields keep their
/// current value.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ThresholdPatch {
    pub soil_moisture: Option<SoilMoisturePatch>,
    pub temperature: Option<TemperaturePatch>,
}

impl ThresholdPatch {
    pub fn apply(&self, base: ThresholdConfig) -> ThresholdConfig {
        let mut merged = base;
        if let Some(soil) = &self.soil_moisture {
            if let Some(v) = soil.turn_on {
                merged.soil_moisture.turn_on = v;
            }
            if let Some(v) = soil.turn_off {
                merged.soil_moisture.turn_off = v;
            }
        }
        if let Some(temp) = &self.temperature {
            if let Some(v) = temp.turn_on_low {
                merged.temperature.turn_on_low = v;
            }
            if let Some(v) = temp.turn_on_high {
                merged.temperature.turn_on_high = v;
            }
            if let Some(v) = temp.turn_off {
                merged.temperature.turn_off = v;
            }
        }
        merged
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThresholdUpdate {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub thresholds: ThresholdConfig,
}

/// Check the ordering the policy relies on:
/// `soil.turn_on < soil.turn_off` and `temp.turn_off < temp.turn_on_low < temp.turn_on_high`.
pub fn validate(config: &ThresholdConfig) -> Result<(), ControlError> {
    let s = &config.soil_moisture;
    let t = &config.temperature;

    let all = [s.turn_on, s.turn_off, t.turn_on_low, t.turn_on_high, t.turn_off];
    if all.iter().any(|v| !v.is_finite()) {
        return Err(ControlError::InvalidThresholds(
            "all thresholds must be finite numbers".into(),
        ));
    }
    if s.turn_on >= s.turn_off {
        return Err(ControlError::InvalidThresholds(format!(
            "soil_moisture.turn_on ({}) must be below soil_moisture.turn_off ({})",
            s.turn_on, s.turn_off
        )));
    }
    if t.turn_off >= t.turn_on_low {
        return Err(ControlError::InvalidThresholds(format!(
            "temperature.turn_off ({}) must be below temperature.turn_on_low ({})",
            t.turn_off, t.turn_on_low
        )));
    }
    if t.turn_on_low >= t.turn_on_high {
        return Err(ControlError::InvalidThresholds(format!(
            "temperature.turn_on_low ({}) must be below temperature.turn_on_high ({})",
            t.turn_on_low, t.turn_on_high
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ThresholdStore
// ---------------------------------------------------------------------------

/// Loads and saves the threshold singleton.
///
/// Nothing is cached: every decision cycle calls [`load`](Self::load) so an
/// update takes effect on the very next cycle.
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    store: Store,
}

impl ThresholdStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns the persisted thresholds.
    ///
    /// Never fails: a missing record is initialised with the built-in
    /// defaults, and an unreadable or invalid record falls back to them in
    /// memory.
    pub async fn load(&self) -> ThresholdConfig {
        match self.store.load_thresholds().await {
            Ok(Some(config)) => match validate(&config) {
                Ok(()) => {
                    info!(
                        soil_on = config.soil_moisture.turn_on,
                        soil_off = config.soil_moisture.turn_off,
                        "Loaded thresholds"
                    );
                    config
                }
                Err(e) => {
                    warn!(error = %e, "Persisted thresholds are invalid; using defaults");
                    ThresholdConfig::default()
                }
            },
            Ok(None) => {
                info!("No thresholds stored yet; initialising defaults");
                let defaults = ThresholdConfig::default();
                self.save(&defaults).await;
                defaults
            }
            // The stored record is left untouched.
            Err(e) => {
                warn!(error = %e, "Failed to load thresholds; using defaults");
                ThresholdConfig::default()
            }
        }
    }

    /// Persists `config` rounded to the stored precision. Returns `false`
    /// (and logs) on failure.
    pub async fn save(&self, config: &ThresholdConfig) -> bool {
        match self.store.save_thresholds(&config.rounded()).await {
            Ok(()) => {
                info!("Saved thresholds");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to save thresholds");
                false
            }
        }
    }

    /// Merge `patch` into the persisted thresholds and persist the result.
    ///
    /// A merged config that breaks the ordering is rejected before anything
    /// is written. Unlike [`load`](Self::load), a failed read is an error:
    /// merging into the defaults would overwrite fields the patch left out.
    /// A failed write is reported in the result.
    pub async fn update(&self, patch: &ThresholdPatch) -> Result<ThresholdUpdate, ControlError> {
        let current = match self.store.load_thresholds().await? {
            Some(config) if validate(&config).is_ok() => config,
            _ => ThresholdConfig::default(),
        };
        let merged = patch.apply(current).rounded();
        validate(&merged)?;

        if self.save(&merged).await {
            Ok(ThresholdUpdate {
                success: true,
                message: Some("Thresholds updated and saved to database".into()),
                error: None,
                thresholds: merged,
            })
        } else {
            Ok(ThresholdUpdate {
                success: false,
                message: None,
                error: Some("Failed to save thresholds to database".into()),
                thresholds: merged,
            })
        }
    }
}
