//! CLI for PopBridge
//!
//! Starts the HTTP publish API and forwards accepted messages to the broker
//! at `--zookeeperhost`. Messages accepted while the broker is unreachable
//! are buffered in memory and sent once it is back.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use popbridge::Bridge;
use popbridge::client::WebSocketClient;
use popbridge::config::{Settings, load_config};
use popbridge::transport::{self, http::PUBLISH_ROUTE};
use popbridge::utils::logging;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    name = "popbridge",
    about = "Bridge to send messages to a topic broker through a REST API"
)]
struct Cli {
    /// Broker address, overrides `broker.endpoint` from the configuration
    #[arg(short = 'z', long = "zookeeperhost", alias = "endpoint", value_name = "HOST:PORT")]
    endpoint: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // read before logging starts so a RUST_LOG from .env applies
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose));
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(e) => debug!("No .env file loaded: {e}"),
    }

    let mut settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::from(2);
        }
    };

    match cli.endpoint.or(settings.broker.endpoint.take()) {
        Some(endpoint) => settings.broker.endpoint = Some(endpoint),
        None => {
            if let Err(e) = Cli::command().print_help() {
                error!("Failed to print usage: {e}");
            }
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = run_server(settings).await {
        error!("Server failed: {e}");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}

async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = settings
        .broker
        .endpoint
        .clone()
        .ok_or("no broker endpoint configured")?;
    let client = Arc::new(WebSocketClient::new(&settings.broker));
    let bridge = Bridge::start(client, endpoint, settings.broker.partition);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("REST server running on http://{addr}{PUBLISH_ROUTE}");

    transport::serve(listener, bridge.clone(), shutdown_signal()).await?;

    bridge.shutdown().await;
    info!("Exiting gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Caught interrupt signal");
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn endpoint_flag_and_alias() {
        let cli = Cli::try_parse_from(["popbridge", "-z", "broker:2181"]).unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("broker:2181"));
        assert!(!cli.verbose);

        let cli = Cli::try_parse_from(["popbridge", "--endpoint", "broker:2181", "-v"]).unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("broker:2181"));
        assert!(cli.verbose);
    }

    #[test]
    fn endpoint_is_optional_on_the_command_line() {
        let cli = Cli::try_parse_from(["popbridge"]).unwrap();
        assert!(cli.endpoint.is_none());
    }
}
