//! Managed resources: nodes, group members and their status

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Reported status of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceStatus {
    #[serde(rename = "UP")]
    Up,

    #[serde(rename = "DOWN")]
    Down,

    /// Any status the executor does not interpret
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl<'de> Deserialize<'de> for ResourceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Statuses the executor does not know collapse to Unknown instead
        // of failing the whole document.
        let status = String::deserialize(deserializer)?;
        Ok(match status.as_str() {
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            _ => Self::Unknown,
        })
    }
}

impl ResourceStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Engine sub-record describing the runtime hosting a resource.
///
/// Containers carry the engine id of the node that runs them, which is the
/// linkage used to resolve a member back to its host node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Free-form text, may embed JSON (e.g. the published-ports list)
    #[serde(default)]
    pub options: Option<String>,
}

/// A managed machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub cloud_id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub engine: Engine,

    /// Routable address of the node
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub options: Option<String>,
}

impl Node {
    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }
}

/// A group member as returned by the members endpoint.
///
/// Members are heterogeneous (nodes or containers); only the identity,
/// status and engine linkage are interpreted by executors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub cloud_id: String,

    #[serde(default)]
    pub name: Option<String>,

    pub status: ResourceStatus,

    #[serde(default)]
    pub engine: Option<Engine>,
}

impl Member {
    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }

    /// Engine id of the runtime hosting this member, if reported
    pub fn engine_id(&self) -> Option<&str> {
        self.engine.as_ref().map(|e| e.id.as_str())
    }
}
