use std::time::Instant;

use gosolis_device::Device;

use crate::cmd::Context;
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::print_ping;

pub fn run(ctx: &Context) -> CliResult<i32> {
    let device = Device::new(ctx.connect()?, ctx.config.inverter.address());

    let started = Instant::now();
    device
        .ping()
        .map_err(|err| device_error("ping failed", err))?;

    print_ping(device.address(), started.elapsed(), ctx.format);
    Ok(SUCCESS)
}
