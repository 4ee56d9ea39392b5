//! Trigger handler host: dequeue work, dispatch to a handler, publish results

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use storm_client::ApiClient;
use storm_core::{Query, Trigger, TriggerStatus};
use tracing::{debug, info, warn};

/// A handler executing one kind of trigger (selected by trigger name)
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// Trigger name this handler claims, e.g. `recipe`
    fn name(&self) -> &str;

    /// Execute the work; the returned map becomes the trigger result
    async fn handle(&self, trigger: &Trigger) -> anyhow::Result<Map<String, Value>>;
}

/// Polls for pending triggers and drives them through the lifecycle:
/// pending -> running -> done/error.
pub struct HandlerHost {
    client: ApiClient,
    poll_interval: Duration,
}

impl HandlerHost {
    pub fn new(client: &ApiClient, poll_interval: Duration) -> Self {
        Self {
            client: client.clone(),
            poll_interval,
        }
    }

    /// Serve a handler until a termination signal.
    ///
    /// A failing trigger never aborts the host; the failure is published as
    /// the trigger's `error` result and the host moves on.
    pub async fn run(&self, handler: &dyn TriggerHandler) -> Result<()> {
        info!("Serving {} triggers", handler.name());
        loop {
            if let Err(e) = self.step(handler).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Trigger sweep failed, retrying next tick: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    return Ok(());
                }
            }
        }
    }

    /// One sweep over the pending triggers addressed to this handler
    pub async fn step(&self, handler: &dyn TriggerHandler) -> Result<usize> {
        let pending = self
            .client
            .triggers()
            .find(&Query::and(vec![
                Query::field_eq("name", handler.name()),
                Query::field_eq("status", "pending"),
            ]))
            .await?;

        let mut handled = 0;
        for trigger in pending {
            if self.dispatch(handler, trigger).await {
                handled += 1;
            }
        }
        Ok(handled)
    }

    async fn dispatch(&self, handler: &dyn TriggerHandler, mut trigger: Trigger) -> bool {
        // Claim the trigger; losing the claim to another host is not an error
        trigger.status = TriggerStatus::Running;
        match self.client.triggers().update(&trigger.uuid, &trigger).await {
            Ok(claimed) => trigger = claimed,
            Err(e) => {
                debug!("Could not claim trigger {}: {}", trigger.uuid, e);
                return false;
            }
        }

        match handler.handle(&trigger).await {
            Ok(result) => {
                trigger.status = TriggerStatus::Done;
                trigger.result = result;
            }
            Err(e) => {
                warn!("Trigger {} failed: {:#}", trigger.uuid, e);
                trigger.status = TriggerStatus::Error;
                trigger.result = Map::from_iter([(
                    "reason".to_string(),
                    Value::String(format!("{:#}", e)),
                )]);
            }
        }

        if let Err(e) = self.client.triggers().update(&trigger.uuid, &trigger).await {
            warn!("Could not publish result for trigger {}: {}", trigger.uuid, e);
            return false;
        }
        true
    }
}
