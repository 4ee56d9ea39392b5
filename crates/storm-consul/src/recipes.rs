//! Canonical recipes upserted by the Consul executor at setup.
//!
//! Contents are opaque YAML interpreted by the docker trigger handler;
//! `$VAR` placeholders are expanded from trigger params at invocation.

use storm_core::Recipe;

pub const CONSUL_SERVER: &str = "consul-server";
pub const CONSUL_CLIENT: &str = "consul-client";
pub const CONSUL_JOIN_WAN: &str = "consul-server-join-wan";

const SERVER_CONTENT: &str = "\
run:
  - - --name
    - consul-server
    - --net
    - host
    - consul:1.15
    - agent
    - -server
    - -bootstrap-expect=1
    - -ui
    - -datacenter=$DATACENTER
    - -bind=$SERVER_ADDRESS
    - -client=$CLIENT_ADDRESS
";

const CLIENT_CONTENT: &str = "\
run:
  - - --name
    - consul-client
    - --net
    - host
    - consul:1.15
    - agent
    - -datacenter=$DATACENTER
    - -retry-join=$SERVER_ADDRESS
    - -bind=$CLIENT_ADDRESS
    - -client=$CLIENT_ADDRESS
";

const JOIN_WAN_CONTENT: &str = "\
exec:
  - - consul
    - join
    - -wan
    - $WAN_ADDRESS
";

/// The three recipes the Consul managers submit triggers for
pub fn canonical_recipes() -> Vec<Recipe> {
    vec![
        Recipe::new(CONSUL_SERVER, "docker", SERVER_CONTENT),
        Recipe::new(CONSUL_CLIENT, "docker", CLIENT_CONTENT),
        Recipe::new(CONSUL_JOIN_WAN, "docker", JOIN_WAN_CONTENT)
            .with_option("container", "consul-server"),
    ]
}
