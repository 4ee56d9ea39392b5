//! Load-balancer executor.
//!
//! Watches application resources and keeps one HAProxy per exposed service
//! with its backend membership converged on the service's endpoints.

use anyhow::Result;
use clap::Parser;
use storm_client::ApiClient;
use storm_executor::{init_logging, run_reconciler, ExecutorOpts};
use storm_haproxy::LoadBalancerReconciler;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "storm-loadbalancer",
    version,
    about = "Perfect Storm executor managing HAProxy load balancers"
)]
struct Args {
    #[command(flatten)]
    opts: ExecutorOpts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.opts.debug);

    info!(
        "Starting load balancer executor for pool {}",
        args.opts.nodes_pool
    );
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let client = ApiClient::new(&args.opts.server)?;
    let mut reconciler = LoadBalancerReconciler::new(&client, &args.opts.nodes_pool);

    if let Err(e) = run_reconciler(&mut reconciler, args.opts.poll_interval()).await {
        error!("Load balancer executor failed: {}", e);
        std::process::exit(1);
    }

    info!("Load balancer executor stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["storm-loadbalancer", "-n", "p1", "--debug"]);
        assert_eq!(args.opts.nodes_pool, "p1");
        assert!(args.opts.debug);
    }
}
