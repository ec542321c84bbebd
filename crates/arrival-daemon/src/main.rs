use std::path::PathBuf;

use arrival_core::ArrivalConfig;
use clap::{Parser, Subcommand};

mod commands;
mod feed;

/// Send one Telegram message when you reach a destination.
#[derive(Parser)]
#[command(
    name = "arrival",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ARRIVAL_GIT_SHA"), ")"),
    about = "Geofence-triggered Telegram notifier"
)]
struct Cli {
    /// Runtime config file (defaults to ARRIVAL_CONFIG, then ~/.arrival/arrival.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and store the workflow. Does not start tracking.
    Configure {
        /// Bot token, `<digits>:<secret>`.
        #[arg(long)]
        token: String,
        /// Chat id (`-100123…`) or `@channel`.
        #[arg(long)]
        chat: String,
        #[arg(long)]
        message: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Geofence radius in meters.
        #[arg(long, default_value_t = arrival_core::DEFAULT_RADIUS_METERS)]
        radius: u32,
    },
    /// Arm the stored workflow and evaluate positions until arrival or Ctrl-C.
    Run {
        /// NDJSON position file; stdin when omitted.
        #[arg(long)]
        feed: Option<PathBuf>,
    },
    /// Deactivate the workflow.
    Stop,
    /// Show the persisted status and workflow.
    Status,
    /// Send a test message with the stored token and chat.
    TestMessage,
    /// Erase the stored workflow.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is for command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arrival=info,arrival_monitor=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // explicit flag > ARRIVAL_CONFIG env > ~/.arrival/arrival.toml
    let config_path = cli.config.or_else(|| std::env::var("ARRIVAL_CONFIG").ok());
    let config = ArrivalConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ArrivalConfig::default()
    });

    match cli.command {
        Command::Configure {
            token,
            chat,
            message,
            lat,
            lng,
            radius,
        } => {
            let workflow = arrival_core::WorkflowConfig {
                endpoint_credential: token,
                target_channel: chat,
                message_body: message,
                destination: arrival_core::Coordinate::new(lat, lng),
                radius_meters: radius,
                active: false,
            };
            commands::configure(&config, workflow)
        }
        Command::Run { feed } => commands::run(&config, feed).await,
        Command::Stop => commands::stop(&config).await,
        Command::Status => commands::status(&config),
        Command::TestMessage => commands::test_message(&config).await,
        Command::Clear => commands::clear(&config),
    }
}
