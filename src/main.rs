//! Buy-n-Sell
//!
//! A multiplayer stock-trading lobby: every connected player trades one shared
//! stock whose price moves with each order, alongside a live leaderboard,
//! regional standings and a bull/bear sentiment poll. Also ships an offline
//! solo mode that replays a seeded jump-diffusion market.

mod game;
mod geo;
mod models;
mod server;
mod simulation;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::game::{GameConfig, GameController};
use crate::geo::{GeoConfig, GeoLocator};
use crate::server::GameServer;
use crate::simulation::{simulate, HoldStrategy, SoloGame};

/// Buy-n-Sell lobby server CLI.
#[derive(Parser)]
#[command(name = "buynsell")]
#[command(about = "Shared-price stock trading lobby over WebSocket", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lobby server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "3000")]
        port: u16,

        /// Interface to bind
        #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Skip geo lookups; every player is placed in the "unknown" region
        #[arg(long)]
        no_geoip: bool,

        /// Base URL of the ip-api compatible lookup service
        #[arg(long, env = "GEOIP_URL", default_value = "http://ip-api.com")]
        geoip_url: String,

        /// Budget for one geo lookup in milliseconds, retries included
        #[arg(long, env = "GEOIP_TIMEOUT_MS", default_value = "1500")]
        geoip_timeout_ms: u64,

        /// Whether geo lookups are performed
        #[arg(long, env = "GEOIP_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
        geoip_enabled: bool,
    },

    /// Play one offline solo run and print the summary
    Simulate {
        /// Run seed; a random five digit seed when omitted
        #[arg(short, long)]
        seed: Option<u64>,

        /// Position held from the opening tick
        #[arg(long, value_enum, default_value_t = HoldStrategy::None)]
        hold: HoldStrategy,
    },

    /// Show the lobby configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            no_geoip,
            geoip_url,
            geoip_timeout_ms,
            geoip_enabled,
        } => {
            let config = GameConfig::default();
            let geo = if geoip_enabled && !no_geoip {
                GeoLocator::new(GeoConfig {
                    enabled: true,
                    base_url: geoip_url,
                    timeout: Duration::from_millis(geoip_timeout_ms),
                })?
            } else {
                info!("Geo lookups disabled");
                GeoLocator::disabled()
            };

            let (game, hub_stats, controller) = GameController::spawn(config.clone());
            let addr = format!("{}:{}", host, port);
            let server = GameServer::bind(&addr, game, geo, config.outbound_queue).await?;
            let shutdown = server.shutdown_handle();

            println!("\n=== Buy-n-Sell Lobby ===");
            println!("Listening:      ws://{}", server.local_addr()?);
            println!("Opening price:  ${}", config.initial_price);
            println!("\nPress Ctrl+C to stop.\n");

            tokio::spawn(async move {
                shutdown_signal().await;
                let _ = shutdown.send(());
            });

            server.run().await?;

            // Connection tasks hold controller handles; give them a moment to
            // report their disconnects before the controller winds down.
            if tokio::time::timeout(Duration::from_secs(2), controller).await.is_err() {
                info!("Game controller still draining, exiting anyway");
            }

            let stats = hub_stats.snapshot();
            info!(
                broadcasts = stats.broadcasts,
                frames_sent = stats.frames_sent,
                frames_skipped = stats.frames_skipped,
                "Broadcast totals"
            );
        }

        Commands::Simulate { seed, hold } => {
            let seed = seed.unwrap_or_else(SoloGame::random_seed);
            info!(seed, hold = ?hold, "Starting solo run");

            let summary = simulate(seed, hold)?;
            println!("{}", summary);
        }

        Commands::Config => {
            let config = GameConfig::default();

            println!("\n=== Lobby Configuration ===\n");
            println!("Price:");
            println!("  Opening Price:        ${}", config.initial_price);
            println!("  Price Floor:          ${}", config.price_floor);
            println!("  History Length:       {}", config.history_capacity);

            println!("\nBoards:");
            println!("  Leaderboard Rows:     {}", config.leaderboard_size);
            println!("  Recent Trades:        {}", config.recent_trades_capacity);

            println!("\nDelivery:");
            println!("  Outbound Queue:       {} frames", config.outbound_queue);
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sigterm_triggers_shutdown() {
        let waiter = tokio::spawn(shutdown_signal());
        // Let the handler register before the signal is raised.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let done = tokio::time::timeout(Duration::from_secs(5), waiter).await;
        tokio_test::assert_ok!(done.unwrap());
    }
}
