use gosolis_device::DeviceEmulator;

use crate::cmd::Context;
use crate::exit::{device_error, CliError, CliResult, SUCCESS, USAGE};
use crate::port::open_serial;

pub fn run(ctx: &Context) -> CliResult<i32> {
    if ctx.loopback {
        return Err(CliError::new(
            USAGE,
            "emulate serves a serial port; it cannot be combined with --loopback",
        ));
    }

    let bus = open_serial(&ctx.config.inverter)?;
    DeviceEmulator::new(bus, ctx.config.inverter.address())
        .run()
        .map_err(|err| device_error("emulator stopped", err))?;
    Ok(SUCCESS)
}
