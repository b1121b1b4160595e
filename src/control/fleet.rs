use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet, time};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::{service::CycleOutcome, ControlError, ControlService};
use crate::sensors::SensorService;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FleetFailure {
    pub greenhouse_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum FleetEntry {
    Completed(CycleOutcome),
    Failed(FleetFailure),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FleetReport {
    pub processed: usize,
    pub timestamp: DateTime<Utc>,
    /// One entry per greenhouse, in greenhouse-id order.
    pub results: Vec<FleetEntry>,
}

/// Runs a decision cycle for every greenhouse in the reading stream.
///
/// Greenhouses are processed on at most `concurrency` workers. A failure in
/// one greenhouse becomes an error entry for that id and never stops the
/// others.
#[derive(Clone)]
pub struct FleetProcessor {
    control: ControlService,
    sensors: SensorService,
    concurrency: usize,
}

impl FleetProcessor {
    pub fn new(control: ControlService, sensors: SensorService, concurrency: usize) -> Self {
        Self {
            control,
            sensors,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run_all(&self) -> Result<FleetReport, ControlError> {
        let ids: Vec<String> = self.sensors.greenhouse_ids().await?.into_iter().collect();
        info!(greenhouses = ids.len(), concurrency = self.concurrency, "Processing fleet");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, greenhouse_id) in ids.iter().cloned().enumerate() {
            let control = self.control.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let entry = match control.run_cycle(&greenhouse_id).await {
                    Ok(outcome) => {
                        info!(
                            greenhouse_id = %greenhouse_id,
                            commands_sent = outcome.commands_sent(),
                            "Greenhouse processed"
                        );
                        FleetEntry::Completed(outcome)
                    }
                    Err(e) => {
                        error!(greenhouse_id = %greenhouse_id, error = %e, "Greenhouse processing failed");
                        FleetEntry::Failed(FleetFailure {
                            greenhouse_id,
                            error: e.to_string(),
                        })
                    }
                };
                (index, entry)
            });
        }

        let mut slots: Vec<Option<FleetEntry>> = vec![None; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(e) => warn!(error = %e, "Fleet worker did not complete"),
            }
        }

        // A worker that panicked leaves its slot empty.
        let results: Vec<FleetEntry> = slots
            .into_iter()
            .zip(ids)
            .map(|(slot, greenhouse_id)| {
                slot.unwrap_or_else(|| {
                    FleetEntry::Failed(FleetFailure {
                        greenhouse_id,
                        error: "decision cycle aborted unexpectedly".into(),
                    })
                })
            })
            .collect();

        Ok(FleetReport {
            processed: results.len(),
            timestamp: Utc::now(),
            results,
        })
    }

    /// Runs `run_all` every `interval` until the task is dropped.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "Automation loop started");
        let mut ticker = time::interval(interval);

        loop {
            ticker.tick().await;
            match self.run_all().await {
                Ok(report) => info!(processed = report.processed, "Automation cycle complete"),
                Err(e) => error!(error = %e, "Automation cycle failed"),
            }
        }
    }
}
