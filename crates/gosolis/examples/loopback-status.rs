//! Query an emulated inverter over the in-process loopback bus.
//!
//! Run with:
//!   cargo run --example loopback-status

use std::thread;

use gosolis::bus::LocalBus;
use gosolis::device::{Device, DeviceEmulator};
use gosolis::frame::DeviceId;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (controller, mut interfaces) = LocalBus::new(1)?.into_parts();
    let port = interfaces.remove(0);

    let emulator = thread::spawn(move || DeviceEmulator::new(port, DeviceId(1)).run());

    let device = Device::new(&controller, DeviceId(1));
    device.ping()?;
    let info = device.get_information()?;
    println!("{}", serde_json::to_string_pretty(&info)?);

    // Detaching the controller shuts the bus down and ends the emulator.
    drop(controller);
    emulator
        .join()
        .map_err(|_| "emulator thread panicked")??;
    Ok(())
}
