//! Differential change feeds for monitor-driven executors

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use storm_client::ApiClient;
use storm_core::Application;

/// Diff between two emissions of a monitored resource set
#[derive(Debug, Clone)]
pub struct ResourceDiff<T> {
    pub added: Vec<T>,
    pub updated: Vec<T>,
    pub deleted: Vec<T>,
}

impl<T> Default for ResourceDiff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

impl<T> ResourceDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Produces `(added, updated, deleted)` diffs against the last emission
#[async_trait]
pub trait Monitor {
    type Item;

    async fn poll(&mut self) -> Result<ResourceDiff<Self::Item>>;
}

/// Tracks the set of application resources
pub struct ApplicationsMonitor {
    client: ApiClient,
    known: HashMap<String, Application>,
}

impl ApplicationsMonitor {
    pub fn new(client: &ApiClient) -> Self {
        Self {
            client: client.clone(),
            known: HashMap::new(),
        }
    }
}

#[async_trait]
impl Monitor for ApplicationsMonitor {
    type Item = Application;

    async fn poll(&mut self) -> Result<ResourceDiff<Application>> {
        let current = self.client.apps().all().await?;
        Ok(diff_applications(&mut self.known, current))
    }
}

/// Diff `current` against the tracked set, replacing the tracked set
fn diff_applications(
    known: &mut HashMap<String, Application>,
    current: Vec<Application>,
) -> ResourceDiff<Application> {
    let mut diff = ResourceDiff::default();
    let mut next = HashMap::with_capacity(current.len());
    for app in current {
        match known.get(&app.identifier) {
            None => diff.added.push(app.clone()),
            Some(previous) if previous != &app => diff.updated.push(app.clone()),
            Some(_) => {}
        }
        next.insert(app.identifier.clone(), app);
    }
    for (identifier, app) in known.drain() {
        if !next.contains_key(&identifier) {
            diff.deleted.push(app);
        }
    }

    *known = next;
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_core::ServiceRef;

    fn app(identifier: &str, expose: Vec<ServiceRef>) -> Application {
        Application {
            identifier: identifier.to_string(),
            components: vec!["frontend".to_string()],
            links: vec![],
            expose,
        }
    }

    #[test]
    fn test_first_emission_reports_everything_added() {
        let mut known = HashMap::new();
        let diff = diff_applications(&mut known, vec![app("a1", vec![])]);
        assert_eq!(diff.added.len(), 1);
        assert!(diff.updated.is_empty());
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_unchanged_set_yields_empty_diff() {
        let mut known = HashMap::new();
        diff_applications(&mut known, vec![app("a1", vec![])]);
        let diff = diff_applications(&mut known, vec![app("a1", vec![])]);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_update_and_delete_are_reported() {
        let mut known = HashMap::new();
        diff_applications(&mut known, vec![app("a1", vec![]), app("a2", vec![])]);

        let changed = app("a1", vec![ServiceRef::new("frontend", "http")]);
        let diff = diff_applications(&mut known, vec![changed]);
        assert_eq!(diff.updated.len(), 1);
        assert_eq!(diff.deleted.len(), 1);
        assert_eq!(diff.deleted[0].identifier, "a2");
    }
}
