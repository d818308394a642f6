//! VR gadget controller - command line entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::{signal, time::sleep};
use tracing::{error, info, warn};
use vrgadget::config::ControllerConfig;
use vrgadget::controller::{GadgetControl, GadgetController};
use vrgadget::observability::init_default_logging;
use vrgadget::protocol::GadgetCommand;
use vrgadget::transport::MqttTransport;

/// Demo steps and the pause after each one
const DEMO_SEQUENCE: [(GadgetCommand, Duration); 6] = [
    (GadgetCommand::StartHeating, Duration::from_millis(2000)),
    (GadgetCommand::FinishHeating, Duration::from_millis(1000)),
    (GadgetCommand::StartCooling, Duration::from_millis(2000)),
    (GadgetCommand::FinishCooling, Duration::from_millis(1000)),
    (GadgetCommand::StartSplash, Duration::from_millis(1500)),
    (GadgetCommand::FinishSplash, Duration::from_millis(1000)),
];

/// Resilient MQTT command publisher for the VR gadget
#[derive(Parser)]
#[command(name = "vrgadget")]
#[command(about = "Send control commands to the VR gadget over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the heating, cooling and splash sequence
    Demo,
    /// Send a single command
    Send {
        #[arg(value_enum)]
        command: GadgetCommand,
    },
    /// Connect and report connection status
    Status,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting vrgadget v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Demo => run_demo(&config).await,
        Commands::Send { command } => send_one(&config, command).await,
        Commands::Status => report_status(&config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ControllerConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(ControllerConfig::load_from_file(path)?);
    }

    for path_str in ["vrgadget.toml", "config/vrgadget.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(ControllerConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, using built-in defaults");
    let config = ControllerConfig::default();
    config.validate()?;
    Ok(config)
}

fn build_controller(
    config: &ControllerConfig,
) -> Result<GadgetController<MqttTransport>, Box<dyn std::error::Error>> {
    Ok(GadgetController::from_config(MqttTransport::new(), config)?)
}

async fn run_demo(config: &ControllerConfig) -> CliResult {
    let controller = build_controller(config)?;
    controller.initialize().await?;
    info!("VR gadget controller initialized");

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let outcome = tokio::select! {
        outcome = demo_sequence(&controller) => outcome,
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
            Ok(())
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
            Ok(())
        }
    };

    if let Err(e) = controller.shutdown().await {
        warn!("Error during shutdown: {}", e);
    }
    outcome
}

async fn demo_sequence(controller: &GadgetController<MqttTransport>) -> CliResult {
    for (command, pause) in DEMO_SEQUENCE {
        info!(%command, "Sending command");
        controller.send_command(command).await?;
        sleep(pause).await;
    }
    info!(metrics = ?controller.metrics(), "Demo completed successfully");
    Ok(())
}

async fn send_one(config: &ControllerConfig, command: GadgetCommand) -> CliResult {
    let controller = build_controller(config)?;
    controller.initialize().await?;

    let result = controller.send_command(command).await;
    if let Err(e) = controller.shutdown().await {
        warn!("Error during shutdown: {}", e);
    }
    result?;

    println!("sent {command}");
    Ok(())
}

async fn report_status(config: &ControllerConfig) -> CliResult {
    let controller = build_controller(config)?;

    if let Err(e) = controller.initialize().await {
        warn!("Initial connection failed: {}", e);
    }
    println!("status: {}", controller.status());

    if let Err(e) = controller.shutdown().await {
        warn!("Error during shutdown: {}", e);
    }
    Ok(())
}

fn handle_config_command(config: &ControllerConfig, show: bool) -> CliResult {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
