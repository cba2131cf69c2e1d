use tracing::info;

use crate::cmd::{Context, GridCommand};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::print_grid;

pub fn run(command: GridCommand, ctx: &Context) -> CliResult<i32> {
    let device = ctx.inverter()?;

    let state = match command {
        GridCommand::On => {
            info!("connecting to grid");
            device
                .grid_on()
                .map_err(|err| device_error("grid on failed", err))?;
            "on"
        }
        GridCommand::Off => {
            info!("disconnecting from grid");
            device
                .grid_off()
                .map_err(|err| device_error("grid off failed", err))?;
            "off"
        }
    };

    print_grid(device.address(), state, ctx.format);
    Ok(SUCCESS)
}
