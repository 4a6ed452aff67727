use clap::{Parser, ValueEnum};
use client::movement::MovementTuning;
use client::network::{Client, PlayerProfile, SessionEnd};
use client::settings::{ClientConfig, MemorySettings, SettingsStore};
use log::info;
use shared::Team;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TeamArg {
    Auto,
    Red,
    Blue,
}

impl From<TeamArg> for Team {
    fn from(arg: TeamArg) -> Self {
        match arg {
            TeamArg::Auto => Team::None,
            TeamArg::Red => Team::Red,
            TeamArg::Blue => Team::Blue,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Team to request; auto lets the server balance
    #[arg(short = 't', long, value_enum, default_value = "auto")]
    team: TeamArg,

    /// Mark ready as soon as the session is joined
    #[arg(short = 'r', long)]
    ready: bool,

    /// Simulation ticks per second
    #[arg(long, default_value = "60")]
    tick_rate: u32,

    /// Look sensitivity in degrees per second
    #[arg(long, default_value = "120")]
    sensitivity: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut settings = MemorySettings::default();
    settings.set_last_address(&args.server);
    settings.set_last_name(&args.name);
    settings.set_sensitivity(args.sensitivity);

    let config = ClientConfig {
        tick_rate: args.tick_rate,
        ..ClientConfig::default()
    };
    let tuning = MovementTuning {
        sensitivity: settings.sensitivity(),
        ..MovementTuning::default()
    };
    let profile = PlayerProfile {
        name: settings.last_name().to_string(),
        team: args.team.into(),
        auto_ready: args.ready,
    };

    info!("Starting client...");
    info!("Connecting to: {}", settings.last_address());

    let mut client = Client::new(settings.last_address(), config, tuning, profile);
    match client.run().await? {
        SessionEnd::Kicked(reason) => info!("Server ended the session: {}", reason),
        SessionEnd::ConnectionLost => info!("Connection lost"),
        SessionEnd::Left => info!("Left the session"),
    }

    Ok(())
}
