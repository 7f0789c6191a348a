//! # xytable
//!
//! Motion coordinator for a two-axis table driven by LinuxCNC.
//!
//! ```bash
//! # Serve the socket API against LinuxCNC
//! xytable --config xytable.toml serve
//!
//! # One-shot commands
//! xytable move x 0.5 --speed 3
//! xytable move-to --x 1.0 --y 2.0
//! xytable set-io down on
//!
//! # Without hardware
//! xytable --simulate serve
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info, warn};

use xytable::{
    axis::Axis,
    backend::{LinuxCncBackend, MotionBackend, SimulatedBackend},
    command_executor::linuxcnc::create_linuxcnc,
    communication::run_communication_layer,
    config::{create_default_config, init_config_with_options, Config, ConfigOptions},
    controller::MotionCoordinator,
    logging,
    state_monitor::run_state_monitor,
};

#[derive(Parser, Debug)]
#[command(name = "xytable")]
#[command(version)]
#[command(about = "Motion coordinator for a two-axis table")]
struct Args {
    /// Path to the configuration file (defaults to $CONFIG_PATH or xytable.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the in-memory backend instead of LinuxCNC
    #[arg(short = 's', long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Serve the socket API until interrupted
    Serve,
    /// Move one or both axes by a relative distance
    Move {
        #[command(subcommand)]
        target: MoveTarget,
    },
    /// Move to an absolute position
    #[command(allow_negative_numbers = true)]
    MoveTo {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Home both axes
    Home {
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Home a single axis
    HomeAxis {
        axis: Axis,
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Assert the emergency stop
    Stop,
    /// Clear the emergency stop and re-power the machine
    ClearStop,
    /// Switch a named output
    SetIo { name: String, state: IoState },
    /// Print a status snapshot
    Status,
    /// Print the configured axis limits
    Limits,
    /// Write a default configuration file
    InitConfig,
}

#[derive(Subcommand, Debug)]
enum MoveTarget {
    #[command(allow_negative_numbers = true)]
    X {
        distance: f64,
        #[arg(long)]
        speed: Option<f64>,
    },
    #[command(allow_negative_numbers = true)]
    Y {
        distance: f64,
        #[arg(long)]
        speed: Option<f64>,
    },
    #[command(allow_negative_numbers = true)]
    Xy {
        x_distance: f64,
        y_distance: f64,
        #[arg(long)]
        speed: Option<f64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum IoState {
    On,
    Off,
}

fn load_config(args: &Args) -> Result<Config> {
    let options = match &args.config {
        Some(path) => ConfigOptions::with_path(path),
        None => ConfigOptions::default(),
    };

    let (_manager, config) = init_config_with_options(options).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Run `xytable init-config` to create a default configuration file.");
        e
    })?;

    Ok(config)
}

fn create_backend(config: &Config, simulate: bool) -> Arc<dyn MotionBackend> {
    if simulate {
        info!("Using simulated backend");
        return Arc::new(SimulatedBackend::new());
    }

    let (executor, sender) = create_linuxcnc(&config.backend);
    executor.spawn();

    Arc::new(LinuxCncBackend::new(sender))
}

async fn serve(coordinator: Arc<MotionCoordinator>, config: &Config) -> Result<()> {
    let (status_tx, status_rx) = watch::channel(coordinator.get_status().await);

    let monitor = tokio::spawn(run_state_monitor(
        coordinator.clone(),
        config.movement.status_poll(),
        status_tx,
    ));

    let server = run_communication_layer(&config.server.socket_path, coordinator.clone(), status_rx);

    let result = tokio::select! {
        result = server => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal");
            Ok(())
        }
    };

    monitor.abort();
    coordinator.shutdown().await;

    if let Err(e) = std::fs::remove_file(&config.server.socket_path) {
        warn!("Failed to remove socket file: {}", e);
    }

    result
}

async fn run_once(coordinator: &MotionCoordinator, command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Move { target } => match target {
            MoveTarget::X { distance, speed } => {
                coordinator.move_single_axis(Axis::X, distance, speed).await?
            }
            MoveTarget::Y { distance, speed } => {
                coordinator.move_single_axis(Axis::Y, distance, speed).await?
            }
            MoveTarget::Xy {
                x_distance,
                y_distance,
                speed,
            } => {
                coordinator
                    .move_coordinated(x_distance, y_distance, speed)
                    .await?
            }
        },
        CliCommand::MoveTo { x, y, speed } => {
            coordinator.move_absolute(x, y, speed).await?;

            let tolerance = coordinator.movement_config().position_tolerance;
            let status = coordinator.get_status().await;
            for (axis, target) in [(Axis::X, x), (Axis::Y, y)] {
                if status.at_position(axis, target, tolerance) == Some(false) {
                    warn!(
                        "{} axis not yet at {:.4} (backend may still be moving)",
                        axis, target
                    );
                }
            }
        }
        CliCommand::Home { speed } => coordinator.home_axes(speed).await?,
        CliCommand::HomeAxis { axis, speed } => coordinator.home_axis(axis, speed).await?,
        CliCommand::Stop => coordinator.emergency_stop().await?,
        CliCommand::ClearStop => coordinator.clear_emergency_stop().await?,
        CliCommand::SetIo { name, state } => {
            coordinator
                .set_io(&name, matches!(state, IoState::On))
                .await?
        }
        CliCommand::Status => {
            println!("{}", coordinator.get_status().await);
            return Ok(());
        }
        CliCommand::Limits => {
            println!("{}", coordinator.registry());
            return Ok(());
        }
        other => anyhow::bail!("{:?} is not a one-shot command", other),
    }

    println!("OK");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    if let CliCommand::InitConfig = args.command {
        let path = create_default_config(args.config.as_ref())?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = load_config(&args)?;
    let _log_guard = logging::init(&config.logging, args.verbose)?;
    info!("xytable v{} starting", env!("CARGO_PKG_VERSION"));

    let backend = create_backend(&config, args.simulate);
    let coordinator = Arc::new(MotionCoordinator::from_config(backend, &config));

    if let Err(e) = coordinator.connect().await {
        error!("Initial connection failed, will retry per command: {}", e);
    }

    match args.command {
        CliCommand::Serve => serve(coordinator, &config).await,
        command => {
            let result = run_once(&coordinator, command).await;
            coordinator.shutdown().await;
            result
        }
    }
}
