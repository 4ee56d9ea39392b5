//! Clients manager: fan a Consul client out to every other UP pool node

use crate::context::{ConsulContext, RECIPE_TRIGGER};
use crate::recipes;
use std::collections::HashSet;
use storm_core::{Node, Query};
use storm_executor::Result;
use tracing::{debug, info, warn};

/// UP pool nodes not yet covered by a client container or the server node
fn nodes_missing_clients(up_nodes: Vec<Node>, have: &HashSet<String>) -> Vec<Node> {
    up_nodes
        .into_iter()
        .filter(|node| !have.contains(&node.cloud_id))
        .collect()
}

pub struct ClientsManager;

impl ClientsManager {
    pub async fn update(&self, ctx: &ConsulContext) -> Result<()> {
        let Some((server_node, server_ip)) = ctx.server().await? else {
            debug!("No consul server yet, skipping client fan-out");
            return Ok(());
        };

        let mut have = self.nodes_running_clients(ctx).await?;
        have.insert(server_node.cloud_id.clone());

        let missing = nodes_missing_clients(ctx.up_pool_nodes().await?, &have);
        if missing.is_empty() {
            debug!("Every pool node runs a consul agent");
            return Ok(());
        }

        for node in missing {
            let Some(address) = node.address.clone() else {
                warn!("Node {} has no address, skipping client", node.name);
                continue;
            };
            info!("Starting consul client on {} ({})", node.name, address);
            let arguments = ctx.recipe_arguments(
                recipes::CONSUL_CLIENT,
                &[
                    ("DATACENTER", ctx.pool.as_str()),
                    ("SERVER_ADDRESS", server_ip.as_str()),
                    ("CLIENT_ADDRESS", address.as_str()),
                ],
                &node.cloud_id,
                Some(&ctx.clients_group),
            );
            // One bad node never stops the fan-out to the others; the
            // failing node re-appears in `missing` next tick.
            match ctx.driver.run(RECIPE_TRIGGER, arguments).await {
                Ok(_) => info!("Consul client started on {}", node.name),
                Err(e) if !e.is_fatal() => {
                    warn!("Client trigger for {} failed: {}", node.name, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Pool node ids already hosting a client container, found by matching
    /// the containers' engine linkage against the pool membership.
    async fn nodes_running_clients(&self, ctx: &ConsulContext) -> Result<HashSet<String>> {
        let containers = ctx
            .client
            .groups()
            .members(&ctx.clients_group, None)
            .await?;
        let engine_ids: Vec<String> = containers
            .iter()
            .filter_map(|c| c.engine_id().map(str::to_string))
            .collect();
        if engine_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let hosts = ctx
            .client
            .groups()
            .members(&ctx.pool, Some(&Query::field_in("engine._id", engine_ids)))
            .await?;
        Ok(hosts.into_iter().map(|m| m.cloud_id).collect())
    }
}
