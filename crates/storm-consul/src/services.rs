//! Services manager: keep the Consul catalog equal to the declared services
//! of every group running in the pool

use crate::catalog::{ConsulCatalog, MANAGED_TAG};
use crate::context::{up_query, ConsulContext};
use std::collections::{HashMap, HashSet};
use storm_core::{Group, Member, Node, Query};
use storm_executor::Result;
use tracing::{debug, info, warn};

/// One `(name, address, port)` entry of the managed catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceEndpoint {
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// Desired catalog: for each UP member hosted in the pool, the bare group
/// service on port 0 plus one entry per declared service.
pub fn desired_services(
    groups: &[(Group, Vec<Member>)],
    nodes_by_engine: &HashMap<String, Node>,
) -> HashSet<ServiceEndpoint> {
    let mut desired = HashSet::new();
    for (group, members) in groups {
        for member in members {
            if !member.is_up() {
                continue;
            }
            // Members without a resolvable host node in the pool are
            // silently skipped; they belong to some other deployment.
            let Some(engine_id) = member.engine_id() else {
                continue;
            };
            let Some(node) = nodes_by_engine.get(engine_id) else {
                continue;
            };
            let Some(address) = node.address.as_ref() else {
                continue;
            };

            desired.insert(ServiceEndpoint {
                name: group.identifier.clone(),
                address: address.clone(),
                port: 0,
            });
            for service in &group.services {
                desired.insert(ServiceEndpoint {
                    name: format!("{}-{}", group.identifier, service.name),
                    address: address.clone(),
                    port: service.port,
                });
            }
        }
    }
    desired
}

pub struct ServicesManager {
    catalog: ConsulCatalog,
}

impl ServicesManager {
    pub fn new(catalog: ConsulCatalog) -> Self {
        Self { catalog }
    }

    pub async fn update(&self, ctx: &ConsulContext) -> Result<()> {
        let Some((_, server_ip)) = ctx.server().await? else {
            debug!("No consul server yet, skipping catalog sync");
            return Ok(());
        };

        let desired = self.desired_set(ctx).await?;
        let observed = self.observed_set(&server_ip).await?;

        for endpoint in desired.difference(&observed) {
            info!(
                "Registering {} at {}:{}",
                endpoint.name, endpoint.address, endpoint.port
            );
            if let Err(e) = self
                .catalog
                .register(&endpoint.address, &endpoint.name, endpoint.port)
                .await
            {
                warn!("Could not register {}: {}", endpoint.name, e);
            }
        }
        for endpoint in observed.difference(&desired) {
            info!("Deregistering {} at {}", endpoint.name, endpoint.address);
            if let Err(e) = self
                .catalog
                .deregister(&endpoint.address, &endpoint.name)
                .await
            {
                warn!("Could not deregister {}: {}", endpoint.name, e);
            }
        }
        Ok(())
    }

    async fn desired_set(&self, ctx: &ConsulContext) -> Result<HashSet<ServiceEndpoint>> {
        let pool_members = ctx.client.groups().members(&ctx.pool, None).await?;
        let pool_ids: Vec<String> = pool_members.into_iter().map(|m| m.cloud_id).collect();
        let nodes = if pool_ids.is_empty() {
            Vec::new()
        } else {
            ctx.client
                .nodes()
                .find(&Query::field_in("cloud_id", pool_ids))
                .await?
        };
        let nodes_by_engine: HashMap<String, Node> = nodes
            .into_iter()
            .map(|node| (node.engine.id.clone(), node))
            .collect();

        let mut groups_with_members = Vec::new();
        for group in ctx.client.groups().all().await? {
            let members = match ctx
                .client
                .groups()
                .members(&group.identifier, Some(&up_query()))
                .await
            {
                Ok(members) => members,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            groups_with_members.push((group, members));
        }

        Ok(desired_services(&groups_with_members, &nodes_by_engine))
    }

    async fn observed_set(&self, server_ip: &str) -> Result<HashSet<ServiceEndpoint>> {
        let mut observed = HashSet::new();
        let services = self.catalog.services(server_ip).await?;
        for (name, tags) in services {
            if !tags.iter().any(|t| t == MANAGED_TAG) {
                continue;
            }
            for entry in self.catalog.service(server_ip, &name).await? {
                if entry.is_managed() {
                    observed.insert(ServiceEndpoint {
                        name: entry.name,
                        address: entry.address,
                        port: entry.port,
                    });
                }
            }
        }
        Ok(observed)
    }
}
