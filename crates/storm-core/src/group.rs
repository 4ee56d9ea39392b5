//! Groups: named, query-defined collections of nodes or containers

use crate::query::Query;
use serde::{Deserialize, Serialize};

/// A service declared on a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    pub protocol: String,
    pub port: u16,
}

/// A named bag of resources.
///
/// Membership is dynamic: the group's own query is composed server-side with
/// any caller filter, and the include/exclude lists override the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

impl Group {
    /// A group whose membership is manipulated explicitly rather than queried
    pub fn explicit(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            query: Some(Query::Empty),
            include: Vec::new(),
            exclude: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }
}
