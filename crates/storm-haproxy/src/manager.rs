//! Per-exposed-service managers: one HAProxy instance, slot-based backend

use crate::error::HaproxyError;
use crate::haproxy::HaproxyClient;
use crate::recipes;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use storm_client::{ApiClient, ApiError};
use storm_core::{Node, Query};
use storm_executor::{ExecutorError, Result, TriggerDriver};
use tracing::{debug, info, warn};

pub fn up_query() -> Query {
    Query::field_eq("status", "UP")
}

/// Shared state of the load-balancer executor
pub struct LbContext {
    pub client: ApiClient,
    pub driver: TriggerDriver,
    pub pool: String,
}

impl LbContext {
    pub fn new(client: &ApiClient, pool: &str) -> Self {
        Self {
            client: client.clone(),
            driver: TriggerDriver::new(client),
            pool: pool.to_string(),
        }
    }

    pub async fn up_pool_nodes(&self) -> Result<Vec<Node>> {
        let members = self
            .client
            .groups()
            .members(&self.pool, Some(&up_query()))
            .await?;
        let ids: Vec<String> = members.into_iter().map(|m| m.cloud_id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .client
            .nodes()
            .find(&Query::field_in("cloud_id", ids))
            .await?)
    }

    /// Pool nodes keyed by their engine id, for host-node resolution
    pub async fn pool_nodes_by_engine(&self) -> Result<HashMap<String, Node>> {
        let members = self.client.groups().members(&self.pool, None).await?;
        let ids: Vec<String> = members.into_iter().map(|m| m.cloud_id).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let nodes = self
            .client
            .nodes()
            .find(&Query::field_in("cloud_id", ids))
            .await?;
        Ok(nodes
            .into_iter()
            .map(|node| (node.engine.id.clone(), node))
            .collect())
    }
}

/// Keeps exactly one HAProxy container UP for its service
pub struct SingleServerManager {
    /// Group holding the load-balancer instance
    pub group: String,
    pub port: u16,
}

impl SingleServerManager {
    pub async fn update(&self, ctx: &LbContext) -> Result<()> {
        let running = ctx
            .client
            .groups()
            .members(&self.group, Some(&up_query()))
            .await?;
        if !running.is_empty() {
            debug!("Load balancer {} already running", self.group);
            return Ok(());
        }

        let nodes = ctx.up_pool_nodes().await?;
        let Some(node) = nodes.choose(&mut rand::thread_rng()) else {
            info!("No UP node available for load balancer {}", self.group);
            return Ok(());
        };

        info!(
            "Starting load balancer {} on {} (port {})",
            self.group, node.name, self.port
        );
        let port = self.port.to_string();
        let mut arguments = serde_json::Map::new();
        arguments.insert("recipe".to_string(), recipes::LOAD_BALANCER.into());
        arguments.insert(
            "params".to_string(),
            serde_json::json!({"PORT": port}),
        );
        arguments.insert("targetNode".to_string(), node.cloud_id.clone().into());
        arguments.insert("addTo".to_string(), self.group.clone().into());

        match ctx.driver.run("recipe", arguments).await {
            Ok(_) => info!("Load balancer {} started", self.group),
            Err(ExecutorError::TriggerFailed { uuid, reason }) => {
                warn!("Load balancer trigger {} failed: {}", uuid, reason);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

/// Reconciles the HAProxy backend with the endpoints backing the service
pub struct GroupBackendManager {
    /// The exposed component group providing the endpoints
    pub exposed_group: String,
    /// Group holding the load-balancer instance
    pub lb_group: String,
}

impl GroupBackendManager {
    pub async fn update(&self, ctx: &LbContext) -> Result<()> {
        let Some(lb_address) = self.instance_address(ctx).await? else {
            debug!("No load balancer up for {} yet", self.exposed_group);
            return Ok(());
        };

        let mut haproxy = HaproxyClient::new(&lb_address);
        haproxy
            .refresh_slots()
            .await
            .map_err(anyhow::Error::from)?;

        let desired = self.desired_endpoints(ctx).await?;
        let observed = haproxy.get_members();

        // Remove first, freeing slots for the adds below
        for address in observed.difference(&desired) {
            info!("Removing {} from backend of {}", address, self.exposed_group);
            haproxy
                .remove_member(address)
                .await
                .map_err(anyhow::Error::from)?;
        }
        for address in desired.difference(&observed) {
            info!("Adding {} to backend of {}", address, self.exposed_group);
            match haproxy.add_member(address).await {
                Ok(()) => {}
                Err(e @ HaproxyError::NoFreeSlot { .. }) => {
                    // Operator-visible capacity limit; the member stays
                    // dropped until some existing member leaves
                    warn!("Cannot add {}: {}", address, e);
                }
                Err(e) => return Err(anyhow::Error::from(e).into()),
            }
        }
        Ok(())
    }

    /// Address of the UP load-balancer instance, if one exists
    async fn instance_address(&self, ctx: &LbContext) -> Result<Option<String>> {
        let members = ctx
            .client
            .groups()
            .members(&self.lb_group, Some(&up_query()))
            .await?;
        let Some(member) = members.first() else {
            return Ok(None);
        };
        let node = match ctx.client.shortcuts().get_node_for(member).await {
            Ok(node) => node,
            Err(ApiError::Resolution(reason)) => {
                warn!("Cannot resolve load balancer node: {}", reason);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(node.address)
    }

    /// Addresses of UP members of the exposed group hosted in the pool
    async fn desired_endpoints(&self, ctx: &LbContext) -> Result<HashSet<String>> {
        let members = match ctx
            .client
            .groups()
            .members(&self.exposed_group, Some(&up_query()))
            .await
        {
            Ok(members) => members,
            Err(e) if e.is_not_found() => {
                warn!("Exposed group {} does not exist", self.exposed_group);
                return Ok(HashSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        let nodes_by_engine = ctx.pool_nodes_by_engine().await?;
        Ok(members
            .iter()
            .filter_map(|member| {
                let node = nodes_by_engine.get(member.engine_id()?)?;
                node.address.clone()
            })
            .collect())
    }
}
