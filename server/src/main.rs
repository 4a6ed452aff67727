use clap::Parser;
use log::{info, warn};
use server::match_state::MatchConfig;
use server::network::{Server, ServerMessage};
use server::utils::tick_duration;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Authority ticks per second
    #[arg(short, long, default_value = "50")]
    tick_rate: u32,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Seconds between everyone being ready and the level load
    #[arg(long, default_value = "5")]
    countdown_secs: u64,

    /// Match length in seconds, 0 plays until a team empties
    #[arg(long, default_value = "600")]
    match_time_limit_secs: u64,

    /// Seconds the Ending phase is shown before returning to the lobby
    #[arg(long, default_value = "10")]
    ending_secs: u64,

    /// Level rotation, comma separated
    #[arg(long, value_delimiter = ',', default_value = "arena")]
    levels: Vec<String>,

    /// Level loaded when returning to the lobby
    #[arg(long, default_value = "lobby")]
    lobby_level: String,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    client_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let config = MatchConfig {
        countdown: Duration::from_secs(args.countdown_secs),
        match_time_limit: Duration::from_secs(args.match_time_limit_secs),
        ending_display: Duration::from_secs(args.ending_secs),
        levels: args.levels,
        lobby_level: args.lobby_level,
    };

    let bind_addr = format!("{}:{}", args.host, args.port);
    info!("Starting server on {}", bind_addr);
    info!(
        "Tick rate: {}Hz, max clients: {}, levels: {:?}",
        args.tick_rate, args.max_clients, config.levels
    );

    let mut server = Server::new(
        &bind_addr,
        tick_duration(args.tick_rate),
        args.max_clients,
        config,
        Duration::from_secs(args.client_timeout_secs),
    )
    .await?;

    let control = server.control();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                let _ = control.send(ServerMessage::Shutdown);
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;

    Ok(())
}
