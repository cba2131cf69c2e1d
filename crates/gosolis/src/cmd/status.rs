use crate::cmd::Context;
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::print_status;

pub fn run(ctx: &Context) -> CliResult<i32> {
    let device = ctx.inverter()?;
    let info = device
        .get_information()
        .map_err(|err| device_error("failed to read device information", err))?;

    print_status(&info, ctx.format);
    Ok(SUCCESS)
}
