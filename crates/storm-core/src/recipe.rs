//! Recipes: typed templates for instantiating or mutating cloud resources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A recipe document.
///
/// `content` is opaque text at this level; only the matching trigger handler
/// parses it. Targeting hints select where the handler may run the recipe
/// and where created resources are registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub identifier: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub content: String,

    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// `$VAR` defaults expanded at invocation
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    #[serde(rename = "targetNode", default, skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,

    #[serde(rename = "targetAnyOf", default, skip_serializing_if = "Option::is_none")]
    pub target_any_of: Option<String>,

    #[serde(rename = "targetAllIn", default, skip_serializing_if = "Option::is_none")]
    pub target_all_in: Option<String>,

    #[serde(rename = "addTo", default, skip_serializing_if = "Option::is_none")]
    pub add_to: Option<String>,
}

impl Recipe {
    pub fn new(identifier: &str, kind: &str, content: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            kind: kind.to_string(),
            content: content.to_string(),
            options: BTreeMap::new(),
            params: BTreeMap::new(),
            target_node: None,
            target_any_of: None,
            target_all_in: None,
            add_to: None,
        }
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }
}
