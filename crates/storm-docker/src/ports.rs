//! Host-port conflict detection for run commands.
//!
//! Nodes report their already-published ports inside the engine's free-form
//! options blob; a node qualifies for a run command only when none of the
//! command's requested host ports appear there.

use regex::Regex;
use storm_core::Node;

/// Host ports requested by `-p host:container` specs across the commands
pub fn required_host_ports(commands: &[Vec<String>]) -> Vec<u16> {
    let mut ports = Vec::new();
    for command in commands {
        let mut args = command.iter();
        while let Some(arg) = args.next() {
            if arg != "-p" && arg != "--publish" {
                continue;
            }
            let Some(spec) = args.next() else {
                break;
            };
            if let Some((host, _)) = spec.split_once(':') {
                if let Ok(port) = host.parse::<u16>() {
                    ports.push(port);
                }
            }
        }
    }
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// Whether the node's engine options mention `"<port>:<anything>"`
pub fn publishes_port(node: &Node, port: u16) -> bool {
    let Some(options) = node.engine.options.as_deref() else {
        return false;
    };
    // The options blob embeds entries like "ports": ["80:80"]; matching the
    // quoted host-port prefix is enough to detect a taken port.
    Regex::new(&format!(r#""{}:\d+""#, port))
        .map(|pattern| pattern.is_match(options))
        .unwrap_or(false)
}

/// First UP node that publishes none of the requested host ports
pub fn find_node_with_free_ports<'a>(nodes: &'a [Node], ports: &[u16]) -> Option<&'a Node> {
    nodes
        .iter()
        .filter(|node| node.is_up())
        .find(|node| ports.iter().all(|port| !publishes_port(node, *port)))
}
