//! Federation manager: WAN-join the local server to remote pool servers

use crate::context::{up_query, ConsulContext, RECIPE_TRIGGER};
use crate::recipes;
use std::collections::HashSet;
use storm_client::ApiError;
use storm_core::Member;
use storm_executor::{ExecutorError, Result};
use tracing::{debug, info, warn};

/// The single UP server of a remote pool. Zero means the remote is not up
/// yet; more than one violates the single-server invariant, and both cases
/// skip the join for this tick.
fn sole_remote_server(members: &[Member]) -> Option<&Member> {
    match members {
        [only] => Some(only),
        _ => None,
    }
}

pub struct FederationManager {
    /// Remote pools already joined during this process lifetime; the join
    /// is idempotent on the Consul side, so forgetting this set on restart
    /// only costs one redundant trigger.
    joined: HashSet<String>,
}

impl FederationManager {
    pub fn new() -> Self {
        Self {
            joined: HashSet::new(),
        }
    }

    pub async fn update(&mut self, ctx: &ConsulContext) -> Result<()> {
        if ctx.federate.is_empty() {
            return Ok(());
        }
        let Some((local_server, _)) = ctx.server().await? else {
            debug!("No local consul server yet, skipping federation");
            return Ok(());
        };

        for pool in &ctx.federate {
            if self.joined.contains(pool) {
                continue;
            }
            match self.join(ctx, pool, &local_server.cloud_id).await {
                Ok(true) => {
                    self.joined.insert(pool.clone());
                }
                Ok(false) => {}
                Err(e) if !e.is_fatal() => {
                    warn!("WAN join with {} failed: {}", pool, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Attempt one WAN join; Ok(true) when the join trigger completed
    async fn join(&self, ctx: &ConsulContext, pool: &str, local_node: &str) -> Result<bool> {
        let remote_group = format!("{}-consul-server", pool);
        let members = match ctx
            .client
            .groups()
            .members(&remote_group, Some(&up_query()))
            .await
        {
            Ok(members) => members,
            Err(e) if e.is_not_found() => {
                warn!("Remote pool {} has no server group yet", pool);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        let Some(remote_server) = sole_remote_server(&members) else {
            warn!(
                "Skipping WAN join with {}: expected exactly one UP server, found {}",
                pool,
                members.len()
            );
            return Ok(false);
        };

        let remote_node = match ctx.client.shortcuts().get_node_for(remote_server).await {
            Ok(node) => node,
            Err(ApiError::Resolution(reason)) => {
                warn!("Cannot resolve {} server node: {}", pool, reason);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        let Some(remote_ip) = remote_node.address else {
            warn!("Remote server node {} has no address", remote_node.name);
            return Ok(false);
        };

        info!("Joining WAN with {} via {}", pool, remote_ip);
        let arguments = ctx.recipe_arguments(
            recipes::CONSUL_JOIN_WAN,
            &[("WAN_ADDRESS", remote_ip.as_str())],
            local_node,
            None,
        );
        match ctx.driver.run(RECIPE_TRIGGER, arguments).await {
            Ok(_) => Ok(true),
            Err(ExecutorError::TriggerFailed { uuid, reason }) => {
                warn!("WAN join trigger {} failed: {}", uuid, reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for FederationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_core::ResourceStatus;

    fn member(cloud_id: &str) -> Member {
        Member {
            cloud_id: cloud_id.to_string(),
            name: None,
            status: ResourceStatus::Up,
            engine: None,
        }
    }

    #[test]
    fn test_no_remote_server_skips_the_join() {
        assert!(sole_remote_server(&[]).is_none());
    }

    #[test]
    fn test_single_remote_server_is_eligible() {
        let members = vec![member("c-1")];
        assert_eq!(
            sole_remote_server(&members).map(|m| m.cloud_id.as_str()),
            Some("c-1")
        );
    }

    #[test]
    fn test_multiple_remote_servers_skip_the_join() {
        let members = vec![member("c-1"), member("c-2")];
        assert!(sole_remote_server(&members).is_none());
    }
}
