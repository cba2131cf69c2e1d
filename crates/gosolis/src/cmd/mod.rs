use std::path::PathBuf;

use clap::{Args, Subcommand};
use gosolis_device::Device;
use tracing::info;

use crate::config::Config;
use crate::exit::{device_error, CliResult};
use crate::output::OutputFormat;
use crate::port::{self, DynBus};

pub mod config;
pub mod daemon;
pub mod emulate;
pub mod grid;
pub mod ping;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print inverter telemetry.
    Status,
    /// Connect to or disconnect from the grid.
    #[command(subcommand)]
    Grid(GridCommand),
    /// Check that the inverter answers and report the round trip.
    Ping,
    /// Poll the inverter periodically and print one JSON report per line.
    Daemon(DaemonArgs),
    /// Answer the protocol on the serial port as an emulated inverter.
    Emulate,
    /// Inspect or save the effective configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Show version information.
    Version(VersionArgs),
}

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub loopback: bool,
    pub format: OutputFormat,
}

impl Context {
    pub fn connect(&self) -> CliResult<DynBus> {
        port::connect(&self.config.inverter, self.loopback)
    }

    /// Open the link and make sure the inverter answers before use.
    pub fn inverter(&self) -> CliResult<Device<DynBus>> {
        let device = Device::new(self.connect()?, self.config.inverter.address());
        info!(address = device.address().0, "connecting to inverter");
        device
            .ping()
            .map_err(|err| device_error("failed to connect to inverter", err))?;
        info!("found inverter");
        Ok(device)
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Status => status::run(ctx),
        Command::Grid(command) => grid::run(command, ctx),
        Command::Ping => ping::run(ctx),
        Command::Daemon(args) => daemon::run(args, ctx),
        Command::Emulate => emulate::run(ctx),
        Command::Config(command) => config::run(command, ctx),
        Command::Version(args) => version::run(args, ctx),
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCommand {
    /// Connect to the grid.
    On,
    /// Disconnect from the grid.
    Off,
}

#[derive(Args, Debug, Default)]
pub struct DaemonArgs {
    /// Seconds between reports. Overrides daemon.interval.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
    /// Seconds between probes while the inverter is offline. Overrides
    /// daemon.probe_interval.
    #[arg(long, value_name = "SECS")]
    pub probe_interval: Option<u64>,
    /// Exit after N reports.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write the effective configuration to FILE as TOML.
    Save {
        /// Destination file.
        file: PathBuf,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build and protocol details.
    #[arg(long)]
    pub extended: bool,
}
