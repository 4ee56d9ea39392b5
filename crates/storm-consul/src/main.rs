//! Consul cluster manager executor.
//!
//! Polls the Perfect Storm API server for membership changes in the nodes
//! pool and converges the observed Consul deployment on the desired one.

use anyhow::Result;
use clap::Parser;
use storm_client::ApiClient;
use storm_consul::ConsulReconciler;
use storm_executor::{init_logging, run_reconciler, ExecutorOpts};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "storm-consul",
    version,
    about = "Perfect Storm executor managing Consul clusters"
)]
struct Args {
    #[command(flatten)]
    opts: ExecutorOpts,

    /// Remote pool to federate with over WAN (repeatable)
    #[arg(short = 'f', long = "federate")]
    federate: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.opts.debug);

    info!("Starting Consul executor for pool {}", args.opts.nodes_pool);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let client = ApiClient::new(&args.opts.server)?;
    let mut reconciler = ConsulReconciler::new(&client, &args.opts.nodes_pool, args.federate)?;

    if let Err(e) = run_reconciler(&mut reconciler, args.opts.poll_interval()).await {
        error!("Consul executor failed: {}", e);
        std::process::exit(1);
    }

    info!("Consul executor stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from([
            "storm-consul",
            "--nodes-pool",
            "p1",
            "--federate",
            "p2",
            "-f",
            "p3",
            "--poll-interval",
            "5",
        ]);
        assert_eq!(args.opts.nodes_pool, "p1");
        assert_eq!(args.federate, vec!["p2".to_string(), "p3".to_string()]);
        assert_eq!(args.opts.poll_interval, 5);
    }
}
