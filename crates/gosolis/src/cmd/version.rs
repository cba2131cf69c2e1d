use gosolis_device::RECORD_SIZE;
use gosolis_frame::{Command, FRAME_SIZE, MAX_PAYLOAD};
use serde::Serialize;

use crate::cmd::{Context, VersionArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

/// Opcodes this build can send or serve.
const COMMANDS: [Command; 9] = [
    Command::GRID_ON,
    Command::GRID_OFF,
    Command::SET_POWER_STANDARD,
    Command::PING,
    Command::GET_INFORMATION,
    Command::GET_POWER_CURVE,
    Command::SELECT_POWER_CURVE,
    Command::UPDATE_POWER_CURVE,
    Command::LOG,
];

#[derive(Debug, Serialize)]
struct BuildInfo {
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    /// Bytes on the wire for one full frame, start byte included.
    frame_size: usize,
    max_payload: usize,
    record_size: usize,
    commands: Vec<String>,
}

impl BuildInfo {
    fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("GOSOLIS_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("GOSOLIS_BUILD_PROFILE").unwrap_or("unknown"),
            frame_size: FRAME_SIZE + 1,
            max_payload: MAX_PAYLOAD,
            record_size: RECORD_SIZE,
            commands: COMMANDS.iter().map(Command::to_string).collect(),
        }
    }

    fn rows(&self) -> Vec<(String, String)> {
        vec![
            ("version".to_string(), self.version.to_string()),
            ("target".to_string(), self.target.to_string()),
            ("profile".to_string(), self.profile.to_string()),
            ("frame size".to_string(), format!("{} bytes", self.frame_size)),
            ("max payload".to_string(), format!("{} bytes", self.max_payload)),
            ("record size".to_string(), format!("{} bytes", self.record_size)),
            ("commands".to_string(), self.commands.join(", ")),
        ]
    }
}

pub fn run(args: VersionArgs, ctx: &Context) -> CliResult<i32> {
    if !args.extended {
        println!("gosolis {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let info = BuildInfo::current();
    match ctx.format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Table => print_table(info.rows()),
        OutputFormat::Pretty => {
            for (field, value) in info.rows() {
                println!("{field}: {value}");
            }
        }
    }
    Ok(SUCCESS)
}
