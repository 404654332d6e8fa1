#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mafia_server::config;
use mafia_server::logging;
use mafia_server::server::GameServer;
use mafia_server::voice::NullSfu;
use mafia_server::websocket;

/// Mafia server -- authoritative WebSocket backend for real-time Mafia
#[derive(Parser, Debug)]
#[command(name = "mafia-server")]
#[command(about = "Authoritative WebSocket server for real-time multiplayer Mafia")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation = config::validate(&cfg);
    if cli.validate_config {
        match validation {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Host: {}", cfg.host);
                println!("  Port: {}", cfg.port);
                println!("  Static dir: {}", cfg.static_dir);
                println!("  Environment: {:?}", cfg.env);
                println!(
                    "  SFU UDP ports: {}-{}",
                    cfg.sfu.udp_port_min, cfg.sfu.udp_port_max
                );
                println!("  STUN server: {}", cfg.sfu.stun_server);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }
    validation.map_err(|e| anyhow::anyhow!(e))?;

    logging::init(cfg.env);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid HOST/PORT: {e}"))?;

    tracing::info!(%addr, "Starting Mafia server");

    // The SFU media plane runs out of process; the server core only drives
    // the signaling seam.
    tracing::info!(
        udp_port_min = cfg.sfu.udp_port_min,
        udp_port_max = cfg.sfu.udp_port_max,
        stun_server = %cfg.sfu.stun_server,
        "SFU media-plane parameters loaded"
    );
    let sfu = Arc::new(NullSfu::new());
    let server = GameServer::new(Arc::clone(&cfg), sfu);

    let app = websocket::create_router(&cfg.static_dir).with_state(Arc::clone(&server));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        static_dir = %cfg.static_dir,
        "Server started - WebSocket: /ws, Health: /health, Metrics: /metrics"
    );

    let shutdown_server = Arc::clone(&server);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received, draining for up to 10s");
            let drain = shutdown_server.shutdown();
            let _ = tokio::time::timeout(Duration::from_secs(10), drain).await;
        })
        .await?;

    Ok(())
}
