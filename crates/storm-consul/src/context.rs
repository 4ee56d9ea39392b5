//! Shared context for the Consul sub-managers.
//!
//! The executor resolves the nodes pool, derives the three managed groups,
//! and upserts the canonical recipes; every manager then works against this
//! plain record. Later managers read state the earlier ones established
//! (the clients manager reads the server node the server manager wrote), so
//! they run sequentially in documented order.

use crate::recipes;
use serde_json::{json, Map, Value};
use storm_client::{ApiClient, ApiError};
use storm_core::{validation, Group, Node, Query};
use storm_executor::{Result, TriggerDriver};
use tracing::{debug, info, warn};

pub fn up_query() -> Query {
    Query::field_eq("status", "UP")
}

pub struct ConsulContext {
    pub client: ApiClient,
    pub driver: TriggerDriver,

    /// Identifier of the input pool; doubles as the Consul datacenter name
    pub pool: String,

    pub server_group: String,
    pub server_nodes_group: String,
    pub clients_group: String,

    /// Remote pools to federate with over WAN
    pub federate: Vec<String>,
}

impl ConsulContext {
    pub fn new(client: &ApiClient, pool: &str, federate: Vec<String>) -> Self {
        Self {
            client: client.clone(),
            driver: TriggerDriver::new(client),
            pool: pool.to_string(),
            server_group: format!("{}-consul-server", pool),
            server_nodes_group: format!("{}-consul-server-nodes", pool),
            clients_group: format!("{}-consul-clients", pool),
            federate,
        }
    }

    /// Groups whose membership drives the reconcile loop
    pub fn watched_groups(&self) -> Vec<String> {
        vec![
            self.pool.clone(),
            self.server_group.clone(),
            self.server_nodes_group.clone(),
            self.clients_group.clone(),
        ]
    }

    /// Resolve the pool, upsert the managed groups and canonical recipes.
    ///
    /// A missing pool is a configuration error the executor cannot recover
    /// from, so it surfaces as a fatal validation failure.
    pub async fn setup(&self) -> Result<()> {
        let pool = match self.client.groups().get(&self.pool).await {
            Ok(group) => group,
            Err(e) if e.is_not_found() => {
                return Err(ApiError::validation(format!(
                    "nodes pool group {} does not exist",
                    self.pool
                ))
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        validation::validate_group(&pool)?;

        // Membership of the derived groups is manipulated explicitly, so
        // they carry empty queries.
        for name in [
            &self.server_group,
            &self.server_nodes_group,
            &self.clients_group,
        ] {
            let group = Group::explicit(name);
            self.client.groups().update_or_create(name, &group).await?;
            debug!("Upserted group {}", name);
        }

        for recipe in recipes::canonical_recipes() {
            self.client
                .recipes()
                .update_or_create(&recipe.identifier, &recipe)
                .await?;
            debug!("Upserted recipe {}", recipe.identifier);
        }

        info!("Consul executor configured for pool {}", self.pool);
        Ok(())
    }

    /// The current Consul server: the node hosting the single UP member of
    /// the server group, with its address. None until the server manager
    /// has established one (or while its node is unresolvable).
    pub async fn server(&self) -> Result<Option<(Node, String)>> {
        let members = self
            .client
            .groups()
            .members(&self.server_group, Some(&up_query()))
            .await?;
        let Some(member) = members.first() else {
            return Ok(None);
        };

        let node = match self.client.shortcuts().get_node_for(member).await {
            Ok(node) => node,
            Err(ApiError::Resolution(reason)) => {
                warn!("Cannot resolve consul server node: {}", reason);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        match self.client.shortcuts().get_address_for(&node) {
            Ok(address) => Ok(Some((node, address))),
            Err(ApiError::Resolution(reason)) => {
                warn!("Consul server node has no address: {}", reason);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// UP nodes of the pool, as full node records
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
        let nodes = self
            .client
            .nodes()
            .find(&Query::field_in("cloud_id", ids))
            .await?;
        Ok(nodes)
    }

    /// Build the arguments map for a recipe trigger
    pub fn recipe_arguments(
        &self,
        recipe: &str,
        params: &[(&str, &str)],
        target_node: &str,
        add_to: Option<&str>,
    ) -> Map<String, Value> {
        let params: Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        let mut arguments = Map::new();
        arguments.insert("recipe".to_string(), json!(recipe));
        arguments.insert("params".to_string(), Value::Object(params));
        arguments.insert("targetNode".to_string(), json!(target_node));
        if let Some(add_to) = add_to {
            arguments.insert("addTo".to_string(), json!(add_to));
        }
        arguments
    }
}

/// Recipe triggers are dispatched to the docker handler under this name
pub const RECIPE_TRIGGER: &str = "recipe";
