//! Room registry server - Entry Point
//!
//! Starts the registry over WebSocket. Rooms it creates listen on their own
//! ephemeral ports; callers receive those endpoints from the registry.

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use room_chat::{
    Registry, RegistryConfig, RegistryServer, DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_ROOM_SIZE,
};

/// Chat room registry
#[derive(Parser, Debug)]
#[command(name = "room_chat")]
#[command(about = "Allocates ephemeral chat rooms and resolves them by name")]
#[command(version)]
struct Args {
    /// Port for the registry to listen on
    #[arg(short, long)]
    port: u16,

    /// Address the registry binds to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Address rooms bind their listeners to
    #[arg(long, default_value = "0.0.0.0")]
    room_host: IpAddr,

    /// Largest room capacity handed out
    #[arg(long, default_value_t = DEFAULT_MAX_ROOM_SIZE)]
    max_room_size: usize,

    /// Disconnect room clients that send a longer line (bytes)
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    max_line_length: usize,

    /// Close rooms nobody joins within this many seconds
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "room_chat=info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = RegistryConfig {
        max_room_size: args.max_room_size.max(1),
        bind_ip: args.room_host,
        max_line_length: args.max_line_length.max(1),
        idle_timeout: args.idle_timeout_secs.map(Duration::from_secs),
        ..RegistryConfig::default()
    };

    let listener = TcpListener::bind((args.host, args.port)).await?;
    info!("Starting room registry on {}:{}", args.host, args.port);

    let server = RegistryServer::new(Registry::with_config(config));
    server
        .run_until(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Room registry stopped");
    Ok(())
}
