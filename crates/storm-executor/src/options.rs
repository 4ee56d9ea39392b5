//! Shared CLI options and logging setup for executor binaries

use clap::Args;
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000/v1/";

/// Flags common to every reconciling executor
#[derive(Args, Debug, Clone)]
pub struct ExecutorOpts {
    /// Group of nodes this executor manages
    #[arg(short = 'n', long = "nodes-pool")]
    pub nodes_pool: String,

    /// Perfect Storm API server base URL
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Seconds to sleep between polling iterations
    #[arg(long, default_value_t = 1)]
    pub poll_interval: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl ExecutorOpts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// Initialise tracing from RUST_LOG, falling back to the debug flag
pub fn init_logging(debug: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fallback = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        opts: ExecutorOpts,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["x", "-n", "p1"]);
        assert_eq!(cli.opts.nodes_pool, "p1");
        assert_eq!(cli.opts.server, DEFAULT_SERVER);
        assert_eq!(cli.opts.poll_interval(), Duration::from_secs(1));
        assert!(!cli.opts.debug);
    }

    #[test]
    fn test_nodes_pool_is_required() {
        assert!(TestCli::try_parse_from(["x"]).is_err());
    }
}
