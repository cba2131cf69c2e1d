mod cmd;
mod config;
mod exit;
mod logging;
mod output;
mod port;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{Command, Context};
use crate::config::{Config, Overrides};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "gosolis",
    version,
    about = "Ginlong Solis control and monitor",
    long_about = "gosolis is a control and monitor application for Ginlong Solis inverters."
)]
struct Cli {
    /// Config file (default: ~/.gosolis.toml if present).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Serial interface connected to the inverter(s).
    #[arg(long, short = 'p', env = "GOSOLIS_PORT", global = true)]
    port: Option<String>,

    /// Inverter address on the bus [default: 1].
    #[arg(long, short = 'a', env = "GOSOLIS_ADDR", global = true)]
    addr: Option<u8>,

    /// Serial baud rate [default: 9600].
    #[arg(long, env = "GOSOLIS_BAUD", global = true)]
    baud: Option<u32>,

    /// Read timeout in milliseconds [default: 500].
    #[arg(long, short = 't', value_name = "MS", env = "GOSOLIS_TIMEOUT", global = true)]
    timeout: Option<u64>,

    /// Talk to an in-process emulated inverter instead of a serial port.
    #[arg(long, global = true)]
    loopback: bool,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level for gosolis crates (stderr). GOSOLIS_LOG overrides it.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port.clone(),
            addr: self.addr,
            baud: self.baud,
            timeout: self.timeout,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let (mut config, config_path) = match Config::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            let err = exit::config_error(err);
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    };
    config.apply(cli.overrides());

    let ctx = Context {
        config,
        config_path,
        loopback: cli.loopback,
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
    };

    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
