//! Server manager: keep exactly one Consul server running in the pool

use crate::context::{up_query, ConsulContext, RECIPE_TRIGGER};
use crate::recipes;
use rand::seq::SliceRandom;
use storm_core::Node;
use storm_executor::{ExecutorError, Result};
use tracing::{debug, info, warn};

/// Uniform-random pick among the UP pool nodes, used when no node has been
/// designated as server host yet
fn random_up_node(candidates: &[Node]) -> Option<Node> {
    candidates.choose(&mut rand::thread_rng()).cloned()
}

pub struct ServerManager;

impl ServerManager {
    /// If the server group has no UP member, pick a server node, record it
    /// in the server-nodes group and run the server recipe against it.
    pub async fn update(&self, ctx: &ConsulContext) -> Result<()> {
        let running = ctx
            .client
            .groups()
            .members(&ctx.server_group, Some(&up_query()))
            .await?;
        if !running.is_empty() {
            debug!("Consul server already running");
            return Ok(());
        }

        let Some(node) = self.pick_server_node(ctx).await? else {
            info!("No UP node available to host the consul server");
            return Ok(());
        };
        let Some(address) = node.address.clone() else {
            warn!("Chosen server node {} has no address, skipping", node.name);
            return Ok(());
        };

        // Idempotent: recording the same node again is a no-op server-side
        ctx.client
            .groups()
            .add_members(&ctx.server_nodes_group, &[node.cloud_id.clone()])
            .await?;

        info!("Starting consul server on {} ({})", node.name, address);
        let arguments = ctx.recipe_arguments(
            recipes::CONSUL_SERVER,
            &[
                ("DATACENTER", ctx.pool.as_str()),
                ("SERVER_ADDRESS", address.as_str()),
                ("CLIENT_ADDRESS", address.as_str()),
            ],
            &node.cloud_id,
            Some(&ctx.server_group),
        );
        match ctx.driver.run(RECIPE_TRIGGER, arguments).await {
            Ok(_) => info!("Consul server started on {}", node.name),
            Err(ExecutorError::TriggerFailed { uuid, reason }) => {
                // Next reconcile retries with a fresh pick
                warn!("Server trigger {} failed: {}", uuid, reason);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Prefer a node already designated as server host; otherwise a
    /// uniform-random UP member of the pool.
    async fn pick_server_node(&self, ctx: &ConsulContext) -> Result<Option<Node>> {
        let designated = ctx
            .client
            .groups()
            .members(&ctx.server_nodes_group, Some(&up_query()))
            .await?;
        if let Some(member) = designated.first() {
            match ctx.client.nodes().get(&member.cloud_id).await {
                Ok(node) => return Ok(Some(node)),
                Err(e) if e.is_not_found() => {
                    warn!("Designated server node {} is gone", member.cloud_id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let candidates = ctx.up_pool_nodes().await?;
        Ok(random_up_node(&candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_core::{Engine, ResourceStatus};

    fn node(cloud_id: &str) -> Node {
        Node {
            cloud_id: cloud_id.to_string(),
            name: cloud_id.to_string(),
            status: ResourceStatus::Up,
            engine: Engine {
                id: format!("e-{}", cloud_id),
                kind: Some("docker".to_string()),
                options: None,
            },
            address: Some("10.0.0.1".to_string()),
            options: None,
        }
    }

    #[test]
    fn test_no_candidates_means_no_pick() {
        assert!(random_up_node(&[]).is_none());
    }

    #[test]
    fn test_single_candidate_is_always_picked() {
        let picked = random_up_node(&[node("n-1")]).unwrap();
        assert_eq!(picked.cloud_id, "n-1");
    }

    #[test]
    fn test_pick_comes_from_the_candidate_set() {
        let candidates = vec![node("n-1"), node("n-2"), node("n-3")];
        for _ in 0..16 {
            let picked = random_up_node(&candidates).unwrap();
            assert!(candidates.iter().any(|n| n.cloud_id == picked.cloud_id));
        }
    }
}
