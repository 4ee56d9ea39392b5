//! Monitor-driven load-balancer reconciler.
//!
//! Applications are tracked through the applications monitor; every exposed
//! `component[service]` entry of a started application gets one dedicated
//! HAProxy instance plus a backend kept equal to the service's endpoints.

use crate::manager::{GroupBackendManager, LbContext, SingleServerManager};
use crate::recipes;
use async_trait::async_trait;
use std::collections::HashMap;
use storm_client::{ApiClient, ApiError};
use storm_core::{Application, Group, ServiceRef};
use storm_executor::{
    ApplicationsMonitor, GroupWatch, Monitor, Reconciler, ResourceDiff, Result,
};
use tracing::{info, warn};

/// One load-balanced exposed service
struct ExposedService {
    app: String,
    single: SingleServerManager,
    backend: GroupBackendManager,
}

pub struct LoadBalancerReconciler {
    ctx: LbContext,
    monitor: ApplicationsMonitor,
    watch: GroupWatch,
    /// Keyed by the per-service load-balancer group name
    services: HashMap<String, ExposedService>,
    pending: Vec<ResourceDiff<Application>>,
}

impl LoadBalancerReconciler {
    pub fn new(client: &ApiClient, pool: &str) -> Self {
        Self {
            ctx: LbContext::new(client, pool),
            monitor: ApplicationsMonitor::new(client),
            watch: GroupWatch::new(client, vec![pool.to_string()]),
            services: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// `<app>-<component>-<service>` names the per-service instance group
    fn lb_group_name(app: &str, entry: &ServiceRef) -> String {
        format!("{}-{}-{}", app, entry.component, entry.service)
    }

    async fn add_application(&mut self, app: &Application) -> Result<()> {
        for entry in &app.expose {
            let lb_group = Self::lb_group_name(&app.identifier, entry);
            if self.services.contains_key(&lb_group) {
                continue;
            }

            // The exposed service must be declared on its component group;
            // a missing declaration is skipped this tick, not fatal.
            let component = match self.ctx.client.groups().get(&entry.component).await {
                Ok(group) => group,
                Err(e) if e.is_not_found() => {
                    warn!(
                        "Application {} exposes {} but the group does not exist",
                        app.identifier, entry.component
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let Some(service) = component.service(&entry.service) else {
                warn!(
                    "Group {} does not declare service {}",
                    entry.component, entry.service
                );
                continue;
            };

            self.ctx
                .client
                .groups()
                .update_or_create(&lb_group, &Group::explicit(&lb_group))
                .await?;

            info!(
                "Managing load balancer for {} ({}:{})",
                lb_group, entry.component, service.port
            );
            self.services.insert(
                lb_group.clone(),
                ExposedService {
                    app: app.identifier.clone(),
                    single: SingleServerManager {
                        group: lb_group.clone(),
                        port: service.port,
                    },
                    backend: GroupBackendManager {
                        exposed_group: entry.component.clone(),
                        lb_group,
                    },
                },
            );
        }
        Ok(())
    }

    fn drop_application(&mut self, app: &Application) {
        let before = self.services.len();
        self.services.retain(|_, svc| svc.app != app.identifier);
        if self.services.len() != before {
            // Instances keep running; only their management stops here
            info!("Stopped managing load balancers of {}", app.identifier);
        }
    }

    fn rebuild_watch(&mut self) {
        let mut groups = vec![self.ctx.pool.clone()];
        for (lb_group, svc) in &self.services {
            groups.push(lb_group.clone());
            groups.push(svc.backend.exposed_group.clone());
        }
        groups.sort_unstable();
        groups.dedup();
        self.watch = GroupWatch::new(&self.ctx.client, groups);
    }
}

#[async_trait]
impl Reconciler for LoadBalancerReconciler {
    async fn setup(&mut self) -> Result<()> {
        match self.ctx.client.groups().get(&self.ctx.pool).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(ApiError::validation(format!(
                    "nodes pool group {} does not exist",
                    self.ctx.pool
                ))
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        let recipe = recipes::load_balancer_recipe();
        self.ctx
            .client
            .recipes()
            .update_or_create(&recipe.identifier, &recipe)
            .await?;

        info!("Load balancer executor configured for pool {}", self.ctx.pool);
        Ok(())
    }

    async fn poll(&mut self) -> Result<bool> {
        let diff = self.monitor.poll().await?;
        let apps_changed = !diff.is_empty();
        if apps_changed {
            self.pending.push(diff);
        }
        let membership_changed = self.watch.changed().await?;
        Ok(apps_changed || membership_changed)
    }

    async fn run(&mut self) -> Result<()> {
        for diff in std::mem::take(&mut self.pending) {
            for app in &diff.deleted {
                self.drop_application(app);
            }
            for app in diff.updated.iter() {
                // Re-derive the exposed set: drop stale entries, add new
                self.drop_application(app);
                self.add_application(app).await?;
            }
            for app in &diff.added {
                self.add_application(app).await?;
            }
            self.rebuild_watch();
        }

        for svc in self.services.values() {
            svc.single.update(&self.ctx).await?;
            svc.backend.update(&self.ctx).await?;
        }
        Ok(())
    }
}
