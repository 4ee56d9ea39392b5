//! Docker trigger handler host.
//!
//! Claims pending `recipe` triggers from the API server, executes them
//! against node docker engines and publishes the results.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use storm_client::ApiClient;
use storm_docker::RecipeHandler;
use storm_executor::{init_logging, HandlerHost, DEFAULT_SERVER};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "storm-docker",
    version,
    about = "Perfect Storm handler executing recipe triggers via docker"
)]
struct Args {
    /// Perfect Storm API server base URL
    #[arg(long, default_value = DEFAULT_SERVER)]
    server: String,

    /// Seconds to sleep between trigger sweeps
    #[arg(long, default_value_t = 1)]
    poll_interval: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    info!("Starting docker trigger handler");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let client = ApiClient::new(&args.server)?;
    let handler = RecipeHandler::new(&client);
    let host = HandlerHost::new(&client, Duration::from_secs(args.poll_interval));

    if let Err(e) = host.run(&handler).await {
        error!("Docker handler failed: {}", e);
        std::process::exit(1);
    }

    info!("Docker handler stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["storm-docker", "--poll-interval", "3"]);
        assert_eq!(args.poll_interval, 3);
        assert_eq!(args.server, DEFAULT_SERVER);
    }
}
