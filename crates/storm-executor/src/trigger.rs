//! Trigger driver: submit a trigger and await its terminal status

use crate::error::{ExecutorError, Result};
use serde_json::{Map, Value};
use std::time::Duration;
use storm_client::ApiClient;
use storm_core::{NewTrigger, Trigger, TriggerStatus};
use tracing::{debug, warn};

pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Drives the trigger command/response pattern.
///
/// Concurrent triggers from one reconciler are serialised through `wait`;
/// the API server plus its trigger collection is the durable substrate.
#[derive(Debug, Clone)]
pub struct TriggerDriver {
    client: ApiClient,
}

impl TriggerDriver {
    pub fn new(client: &ApiClient) -> Self {
        Self {
            client: client.clone(),
        }
    }

    /// Create a trigger and return its handle
    pub async fn submit(&self, name: &str, arguments: Map<String, Value>) -> Result<Trigger> {
        let trigger = self
            .client
            .triggers()
            .create(&NewTrigger::new(name, arguments))
            .await?;
        debug!("Submitted trigger {} ({})", trigger.uuid, trigger.name);
        Ok(trigger)
    }

    /// Poll the trigger until it reaches a terminal status.
    ///
    /// A `done` trigger is deleted best-effort (deletion failures are
    /// logged, the API server cleans leftovers on TTL). An `error` trigger
    /// surfaces as `TriggerFailed` carrying `result.reason`.
    pub async fn wait(&self, trigger: &Trigger, poll_interval: Duration) -> Result<Trigger> {
        loop {
            let current = self.client.triggers().get(&trigger.uuid).await?;
            match current.status {
                TriggerStatus::Done => {
                    if let Err(e) = self.client.triggers().destroy(&current.uuid).await {
                        warn!("Could not delete finished trigger {}: {}", current.uuid, e);
                    }
                    return Ok(current);
                }
                TriggerStatus::Error => {
                    let reason = current
                        .error_reason()
                        .unwrap_or("no reason reported")
                        .to_string();
                    return Err(ExecutorError::TriggerFailed {
                        uuid: current.uuid,
                        reason,
                    });
                }
                TriggerStatus::Pending | TriggerStatus::Running => {
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    /// Submit and wait with the default poll interval
    pub async fn run(&self, name: &str, arguments: Map<String, Value>) -> Result<Trigger> {
        let trigger = self.submit(name, arguments).await?;
        self.wait(&trigger, DEFAULT_WAIT_INTERVAL).await
    }
}
