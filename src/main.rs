#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use pairlink_server::config;
use pairlink_server::logging;
use pairlink_server::server::{ChatServer, ServerConfig};
use pairlink_server::websocket::{self, AppState};
use std::{net::SocketAddr, sync::Arc};

/// Pairlink -- in-memory WebSocket pairing and signaling server for anonymous 1:1 chat
#[derive(Parser, Debug)]
#[command(name = "pairlink-server")]
#[command(about = "An in-memory WebSocket pairing and signaling server for anonymous 1:1 chat")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration: config.json + PAIRLINK__* env overrides, with
    // code defaults filling everything else.
    let cfg = config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // Handle --print-config: output the loaded configuration as JSON
    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // Validate here rather than inside the loader so --validate-config gets
    // a proper exit code and normal startup fails hard.
    let validation_result =
        config::validate_config(&cfg).map_err(|e| anyhow::anyhow!("{e}"));

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Inactivity threshold: {}s", cfg.server.inactive_threshold_secs);
                println!("  Search timeout: {}s", cfg.server.max_wait_time_secs);
                println!(
                    "  Match thresholds: video {} / text {}",
                    cfg.matching.video_threshold, cfg.matching.text_threshold
                );
                println!("  CORS origins: {}", cfg.security.cors_origins);
                println!("  ICE servers configured: {}", cfg.security.ice_servers.len());
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    // In normal operation, propagate validation errors
    validation_result?;

    // Initialize logging from config.
    logging::init_with_config(&cfg.logging);

    let port: u16 = cfg.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "Starting Pairlink server");

    let server = ChatServer::new(ServerConfig::from_config(&cfg), cfg.matching.clone());

    // Background loops: rematch sweep, inactivity sweep, stats broadcast
    tokio::spawn(server.clone().rematch_task());
    tokio::spawn(server.clone().cleanup_task());
    tokio::spawn(server.clone().stats_broadcast_task());

    let state = AppState {
        server,
        ice_servers: Arc::new(cfg.security.ice_servers.clone()),
    };
    let app = websocket::create_router(&cfg.security.cors_origins).with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.security.cors_origins,
        "Server started - WebSocket: /ws, Stats: /stats, Metrics: /metrics"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["pairlink-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["pairlink-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["pairlink-server", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        // --validate-config and --print-config are mutually exclusive
        let result =
            Cli::try_parse_from(["pairlink-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["pairlink-server", "--version"]);
        assert!(result.is_err()); // --version causes early exit
    }
}
