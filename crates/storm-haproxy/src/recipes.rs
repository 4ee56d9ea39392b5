//! The load-balancer recipe upserted by the executor at setup.
//!
//! Runs HAProxy in host-network mode with a templated configuration: one
//! frontend on `$PORT`, one backend `nodes` of 1024 pre-declared disabled
//! slots bound to `127.0.0.1:$PORT`, and the admin runtime socket on
//! `0.0.0.0:9000`.

use storm_core::Recipe;

pub const LOAD_BALANCER: &str = "load-balancer";

const LOAD_BALANCER_CONTENT: &str = r#"run:
  - - --name
    - load-balancer-$PORT
    - --net
    - host
    - haproxy:2.8
    - sh
    - -c
    - "printf 'global\\n  stats socket ipv4@0.0.0.0:9000 level admin\\ndefaults\\n  mode tcp\\n  timeout connect 5s\\n  timeout client 50s\\n  timeout server 50s\\nfrontend service\\n  bind *:$PORT\\n  default_backend nodes\\nbackend nodes\\n  server-template member 1024 127.0.0.1:$PORT disabled\\n' > /tmp/haproxy.cfg && exec haproxy -f /tmp/haproxy.cfg -db"
"#;

pub fn load_balancer_recipe() -> Recipe {
    Recipe::new(LOAD_BALANCER, "docker", LOAD_BALANCER_CONTENT)
}
