//! The recipe trigger handler.
//!
//! Resolves the recipe named by the trigger, expands params into its
//! decoded commands, picks the target node, drives the node's docker
//! engine, and registers created resources back to the API.

use crate::content::{self, RecipeCommand};
use crate::engine::{NodeEngine, RunSpec};
use crate::error::{HandlerError, Result};
use crate::ports;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use storm_client::ApiClient;
use storm_core::{Node, Query, Trigger};
use storm_executor::TriggerHandler;
use tracing::info;

pub const HANDLER_NAME: &str = "recipe";

/// Targeting hints, trigger arguments overriding recipe defaults.
/// Precedence: a concrete node, then any-of selection, then all-in fan-out.
struct Targeting {
    node: Option<String>,
    any_of: Option<String>,
    all_in: Option<String>,
}

pub struct RecipeHandler {
    client: ApiClient,
}

impl RecipeHandler {
    pub fn new(client: &ApiClient) -> Self {
        Self {
            client: client.clone(),
        }
    }

    async fn execute(&self, trigger: &Trigger) -> Result<Map<String, Value>> {
        let recipe_name = trigger
            .argument("recipe")
            .ok_or_else(|| HandlerError::recipe("trigger names no recipe"))?;
        let recipe = self.client.recipes().get(recipe_name).await?;

        let params = merged_map(&recipe.params, trigger, "params");
        let options = merged_map(&recipe.options, trigger, "options");
        let targets = Targeting {
            node: argument_or(trigger, "targetNode", recipe.target_node.as_deref()),
            any_of: argument_or(trigger, "targetAnyOf", recipe.target_any_of.as_deref()),
            all_in: argument_or(trigger, "targetAllIn", recipe.target_all_in.as_deref()),
        };
        let add_to = argument_or(trigger, "addTo", recipe.add_to.as_deref());

        let command = content::decode(&recipe.content)?;
        info!("Running recipe {} for trigger {}", recipe_name, trigger.uuid);

        match command {
            RecipeCommand::Run(commands) => {
                let commands = expand_all(&commands, &params);
                self.run(&commands, targets, add_to).await
            }
            RecipeCommand::Exec(commands) => {
                let commands = expand_all(&commands, &params);
                self.exec(&commands, targets.node, &options).await
            }
            RecipeCommand::Rm(commands) => {
                let commands = expand_all(&commands, &params);
                self.rm(&commands, targets.node).await
            }
        }
    }

    async fn run(
        &self,
        commands: &[Vec<String>],
        targets: Targeting,
        add_to: Option<String>,
    ) -> Result<Map<String, Value>> {
        let required = ports::required_host_ports(commands);
        let nodes = match targets {
            Targeting {
                node: Some(id), ..
            } => vec![self.client.nodes().get(&id).await?],
            Targeting {
                any_of: Some(group),
                ..
            } => vec![self.pick_node(&group, &required).await?],
            Targeting {
                all_in: Some(group),
                ..
            } => self.eligible_nodes(&group, &required).await?,
            _ => {
                return Err(HandlerError::no_target(
                    "run requires targetNode, targetAnyOf or targetAllIn",
                ));
            }
        };

        let mut containers = Vec::new();
        let mut placed_on = Vec::new();
        for node in &nodes {
            let engine = self.engine_for(node)?;
            for command in commands {
                let spec = RunSpec::parse(command)?;
                containers.push(engine.run(&spec).await?);
            }
            placed_on.push(node.cloud_id.clone());
        }

        if let Some(group) = add_to {
            self.client
                .groups()
                .add_members(&group, &containers)
                .await?;
        }

        let mut result = Map::new();
        result.insert(
            "nodes".to_string(),
            Value::Array(placed_on.into_iter().map(Value::String).collect()),
        );
        result.insert(
            "containers".to_string(),
            Value::Array(containers.into_iter().map(Value::String).collect()),
        );
        Ok(result)
    }

    async fn exec(
        &self,
        commands: &[Vec<String>],
        target_node: Option<String>,
        options: &BTreeMap<String, String>,
    ) -> Result<Map<String, Value>> {
        let node_id = target_node
            .ok_or_else(|| HandlerError::no_target("exec requires a concrete targetNode"))?;
        let container = options
            .get("container")
            .ok_or_else(|| HandlerError::recipe("exec recipe names no container option"))?;

        let node = self.client.nodes().get(&node_id).await?;
        let engine = self.engine_for(&node)?;

        let mut output = String::new();
        for command in commands {
            output.push_str(&engine.exec_in(container, command).await?);
        }

        let mut result = Map::new();
        result.insert("output".to_string(), output.into());
        Ok(result)
    }

    async fn rm(
        &self,
        commands: &[Vec<String>],
        target_node: Option<String>,
    ) -> Result<Map<String, Value>> {
        let node_id = target_node
            .ok_or_else(|| HandlerError::no_target("rm requires a concrete targetNode"))?;
        let node = self.client.nodes().get(&node_id).await?;
        let engine = self.engine_for(&node)?;

        let mut removed = Vec::new();
        for command in commands {
            for container in command {
                engine.remove(container).await?;
                removed.push(container.clone());
            }
        }

        let mut result = Map::new();
        result.insert(
            "removed".to_string(),
            Value::Array(removed.into_iter().map(Value::String).collect()),
        );
        Ok(result)
    }

    /// An UP node of the group that publishes none of the required ports
    async fn pick_node(&self, group: &str, required: &[u16]) -> Result<Node> {
        let nodes = self.group_nodes(group).await?;
        ports::find_node_with_free_ports(&nodes, required)
            .cloned()
            .ok_or_else(|| {
                HandlerError::no_target(format!(
                    "no node in {} with ports {:?} free",
                    group, required
                ))
            })
    }

    /// Every UP node of the group without a port conflict
    async fn eligible_nodes(&self, group: &str, required: &[u16]) -> Result<Vec<Node>> {
        let nodes = self.group_nodes(group).await?;
        let eligible: Vec<Node> = nodes
            .into_iter()
            .filter(|node| {
                node.is_up() && required.iter().all(|port| !ports::publishes_port(node, *port))
            })
            .collect();
        if eligible.is_empty() {
            return Err(HandlerError::no_target(format!(
                "no eligible node in {}",
                group
            )));
        }
        Ok(eligible)
    }

    async fn group_nodes(&self, group: &str) -> Result<Vec<Node>> {
        let members = self
            .client
            .groups()
            .members(group, Some(&Query::field_eq("status", "UP")))
            .await?;
        let ids: Vec<String> = members.into_iter().map(|m| m.cloud_id).collect();
        if ids.is_empty() {
            return Err(HandlerError::no_target(format!(
                "group {} has no UP member",
                group
            )));
        }
        Ok(self
            .client
            .nodes()
            .find(&Query::field_in("cloud_id", ids))
            .await?)
    }

    fn engine_for(&self, node: &Node) -> Result<NodeEngine> {
        let address = node.address.as_deref().ok_or_else(|| {
            HandlerError::no_target(format!("node {} has no address", node.name))
        })?;
        NodeEngine::connect(address)
    }
}

#[async_trait]
impl TriggerHandler for RecipeHandler {
    fn name(&self) -> &str {
        HANDLER_NAME
    }

    async fn handle(&self, trigger: &Trigger) -> anyhow::Result<Map<String, Value>> {
        Ok(self.execute(trigger).await?)
    }
}

/// Recipe defaults overridden by the trigger's same-named argument object
fn merged_map(
    defaults: &BTreeMap<String, String>,
    trigger: &Trigger,
    key: &str,
) -> BTreeMap<String, String> {
    let mut merged = defaults.clone();
    if let Some(overrides) = trigger.arguments.get(key).and_then(Value::as_object) {
        for (name, value) in overrides {
            if let Some(value) = value.as_str() {
                merged.insert(name.clone(), value.to_string());
            }
        }
    }
    merged
}

fn argument_or(trigger: &Trigger, key: &str, fallback: Option<&str>) -> Option<String> {
    trigger
        .argument(key)
        .or(fallback)
        .map(str::to_string)
}

fn expand_all(commands: &[Vec<String>], params: &BTreeMap<String, String>) -> Vec<Vec<String>> {
    commands
        .iter()
        .map(|command| content::expand(command, params))
        .collect()
}
