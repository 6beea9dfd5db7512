mod bridge;
mod command;
mod config;
mod fleet;
mod session;
mod worker;

use bridge::AdbBridge;
use clap::Parser;
use config::FleetConfig;
use session::SessionOrchestrator;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Run a command script on every attached device in parallel
#[derive(Parser, Debug)]
#[command(name = "fleet-adb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bridge executable, looked up on PATH
    #[arg(long, default_value = fleet_shared::defaults::BRIDGE_PROGRAM)]
    adb: String,

    /// Serials to connect before the run (skipped if missing)
    #[arg(long, default_value = fleet_shared::defaults::ALLOW_LIST_FILE)]
    devices: PathBuf,

    /// Command script broadcast to every device
    #[arg(long, default_value = fleet_shared::defaults::SCRIPT_FILE)]
    commands: PathBuf,

    /// Root directory for {output_device}
    #[arg(long, default_value = fleet_shared::defaults::OUTPUT_ROOT)]
    output: PathBuf,

    /// Enable verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> FleetConfig {
        FleetConfig {
            bridge_program: self.adb.clone(),
            allow_list: self.devices.clone(),
            script: self.commands.clone(),
            output_root: self.output.clone(),
        }
    }

    fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(cli.log_level().into()))
        .init();

    let config = cli.config();

    let bridge = match AdbBridge::locate(&config.bridge_program) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Using bridge: {}", bridge.program().display());

    let session = SessionOrchestrator::new(config, Arc::new(bridge));
    match session.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
