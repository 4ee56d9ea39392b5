//! Generic polling executor: setup, then poll-for-change / reconcile forever

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use storm_client::ApiClient;
use tracing::{error, info, warn};

/// A reconciler driven by the polling loop
#[async_trait]
pub trait Reconciler {
    /// Resolve groups, upsert recipes, instantiate sub-managers
    async fn setup(&mut self) -> Result<()>;

    /// True if observed state has changed since the last snapshot
    async fn poll(&mut self) -> Result<bool>;

    /// Drive observed state toward desired state
    async fn run(&mut self) -> Result<()>;
}

/// Run a reconciler until a fatal error or a termination signal.
///
/// The first iteration always reconciles. A transient failure leaves the
/// reconcile pending so the next tick retries it even when membership has
/// not changed again. The signal stops the loop after the in-flight
/// reconcile finishes; in-flight triggers are not cancelled.
pub async fn run_reconciler<R>(reconciler: &mut R, poll_interval: Duration) -> Result<()>
where
    R: Reconciler + Send,
{
    reconciler.setup().await?;
    info!("Setup complete, entering reconcile loop");

    let mut pending = true;
    loop {
        match tick(reconciler, pending).await {
            Ok(()) => pending = false,
            Err(e) if e.is_fatal() => {
                error!("Fatal executor error: {}", e);
                return Err(e);
            }
            Err(e) => {
                warn!("Reconcile failed, retrying next tick: {}", e);
                pending = true;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                return Ok(());
            }
        }
    }
}

async fn tick<R: Reconciler + Send>(reconciler: &mut R, pending: bool) -> Result<()> {
    let changed = reconciler.poll().await?;
    if changed || pending {
        reconciler.run().await?;
    }
    Ok(())
}

/// Membership snapshot poller implementing the change-detection contract:
/// a group has changed when its member cardinality differs or any member id
/// differs from the previous snapshot.
pub struct GroupWatch {
    client: ApiClient,
    groups: Vec<String>,
    snapshot: HashMap<String, Vec<String>>,
}

impl GroupWatch {
    pub fn new(client: &ApiClient, groups: Vec<String>) -> Self {
        Self {
            client: client.clone(),
            groups,
            snapshot: HashMap::new(),
        }
    }

    /// Refresh the snapshot and report whether anything changed.
    ///
    /// The snapshot is updated before deciding, so a single change triggers
    /// exactly one reconcile.
    pub async fn changed(&mut self) -> Result<bool> {
        let mut changed = false;
        for group in &self.groups {
            let mut ids: Vec<String> = self
                .client
                .groups()
                .members(group, None)
                .await?
                .into_iter()
                .map(|m| m.cloud_id)
                .collect();
            ids.sort_unstable();

            if record(&mut self.snapshot, group, ids) {
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Store the observed membership; true when it differs from the snapshot
fn record(snapshot: &mut HashMap<String, Vec<String>>, group: &str, ids: Vec<String>) -> bool {
    match snapshot.insert(group.to_string(), ids.clone()) {
        Some(previous) => previous != ids,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_observation_counts_as_change() {
        let mut snapshot = HashMap::new();
        assert!(record(&mut snapshot, "p1", ids(&[])));
    }

    #[test]
    fn test_equal_membership_is_not_a_change() {
        let mut snapshot = HashMap::new();
        record(&mut snapshot, "p1", ids(&["n-1", "n-2"]));
        assert!(!record(&mut snapshot, "p1", ids(&["n-1", "n-2"])));
    }

    #[test]
    fn test_cardinality_and_identity_changes_are_detected() {
        let mut snapshot = HashMap::new();
        record(&mut snapshot, "p1", ids(&["n-1", "n-2"]));
        assert!(record(&mut snapshot, "p1", ids(&["n-1"])));
        assert!(record(&mut snapshot, "p1", ids(&["n-1", "n-3"])));

        // The snapshot updates before deciding: the same set again is quiet
        assert!(!record(&mut snapshot, "p1", ids(&["n-1", "n-3"])));
    }
}
