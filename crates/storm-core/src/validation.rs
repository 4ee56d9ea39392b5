//! Local model validation.
//!
//! Only rules that need no server round-trip live here; anything the
//! executor cannot interpret locally is rejected by the API instead.

use crate::application::Application;
use crate::error::{Result, StormError};
use crate::group::Group;
use std::collections::{HashMap, HashSet};

/// A group's declared services must have unique names
pub fn validate_group(group: &Group) -> Result<()> {
    let mut seen = HashSet::new();
    for service in &group.services {
        if !seen.insert(service.name.as_str()) {
            return Err(StormError::validation(format!(
                "group {} declares service {} more than once",
                group.identifier, service.name
            )));
        }
    }
    Ok(())
}

/// Every service referenced by an expose or link must exist on its
/// component group, and the component must be part of the application.
pub fn validate_application(app: &Application, groups: &HashMap<String, Group>) -> Result<()> {
    let mut check = |component: &str, service: &str| -> Result<()> {
        if !app.components.iter().any(|c| c == component) {
            return Err(StormError::validation(format!(
                "application {} references unknown component {}",
                app.identifier, component
            )));
        }
        let group = groups.get(component).ok_or_else(|| {
            StormError::validation(format!(
                "application {} references missing group {}",
                app.identifier, component
            ))
        })?;
        if group.service(service).is_none() {
            return Err(StormError::validation(format!(
                "group {} does not declare service {}",
                component, service
            )));
        }
        Ok(())
    };

    for entry in &app.expose {
        check(&entry.component, &entry.service)?;
    }
    for link in &app.links {
        check(&link.dest.component, &link.dest.service)?;
    }
    Ok(())
}
