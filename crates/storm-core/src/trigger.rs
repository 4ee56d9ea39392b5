//! Triggers: asynchronously executed commands

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl TriggerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An asynchronous unit of work.
///
/// Created by a reconciler, claimed by a handler host, driven through
/// `running` to a terminal status, then consumed by the creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub uuid: String,

    /// Handler selector, e.g. `recipe`
    pub name: String,

    #[serde(default)]
    pub arguments: Map<String, Value>,

    pub status: TriggerStatus,

    #[serde(default)]
    pub result: Map<String, Value>,
}

impl Trigger {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Failure reason carried by an `error` result
    pub fn error_reason(&self) -> Option<&str> {
        self.result.get("reason").and_then(Value::as_str)
    }

    /// String-valued argument lookup
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Body for creating a trigger; the API assigns uuid and initial status
#[derive(Debug, Clone, Serialize)]
pub struct NewTrigger {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl NewTrigger {
    pub fn new(name: &str, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.to_string(),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&TriggerStatus::Pending).unwrap(), "\"pending\"");
        let status: TriggerStatus = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(status, TriggerStatus::Done);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TriggerStatus::Pending.is_terminal());
        assert!(!TriggerStatus::Running.is_terminal());
        assert!(TriggerStatus::Done.is_terminal());
        assert!(TriggerStatus::Error.is_terminal());
    }

    #[test]
    fn test_error_reason() {
        let trigger: Trigger = serde_json::from_value(json!({
            "uuid": "t-1",
            "name": "recipe",
            "status": "error",
            "result": {"reason": "no node with free ports"}
        }))
        .unwrap();
        assert_eq!(trigger.error_reason(), Some("no node with free ports"));
    }
}
