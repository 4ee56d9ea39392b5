//! The Consul reconciler: four sub-managers run in documented order

use crate::catalog::ConsulCatalog;
use crate::clients::ClientsManager;
use crate::context::ConsulContext;
use crate::federation::FederationManager;
use crate::server::ServerManager;
use crate::services::ServicesManager;
use async_trait::async_trait;
use storm_client::ApiClient;
use storm_executor::{GroupWatch, Reconciler, Result};

pub struct ConsulReconciler {
    ctx: ConsulContext,
    watch: GroupWatch,
    server: ServerManager,
    clients: ClientsManager,
    services: ServicesManager,
    federation: FederationManager,
}

impl ConsulReconciler {
    pub fn new(client: &ApiClient, pool: &str, federate: Vec<String>) -> Result<Self> {
        Ok(Self::with_catalog(
            client,
            pool,
            federate,
            ConsulCatalog::new()?,
        ))
    }

    /// Build against a specific catalog client (non-standard agent port)
    pub fn with_catalog(
        client: &ApiClient,
        pool: &str,
        federate: Vec<String>,
        catalog: ConsulCatalog,
    ) -> Self {
        let ctx = ConsulContext::new(client, pool, federate);
        let watch = GroupWatch::new(client, ctx.watched_groups());
        Self {
            ctx,
            watch,
            server: ServerManager,
            clients: ClientsManager,
            services: ServicesManager::new(catalog),
            federation: FederationManager::new(),
        }
    }
}

#[async_trait]
impl Reconciler for ConsulReconciler {
    async fn setup(&mut self) -> Result<()> {
        self.ctx.setup().await
    }

    async fn poll(&mut self) -> Result<bool> {
        self.watch.changed().await
    }

    async fn run(&mut self) -> Result<()> {
        // Order matters: each manager reads state the previous one wrote
        self.server.update(&self.ctx).await?;
        self.clients.update(&self.ctx).await?;
        self.services.update(&self.ctx).await?;
        self.federation.update(&self.ctx).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciler_creation() {
        let client = ApiClient::new("http://127.0.0.1:8000/v1/").unwrap();
        let reconciler =
            ConsulReconciler::new(&client, "p1", vec!["p2".to_string()]).unwrap();
        assert_eq!(reconciler.ctx.pool, "p1");
        assert_eq!(reconciler.ctx.federate, vec!["p2".to_string()]);
    }
}
