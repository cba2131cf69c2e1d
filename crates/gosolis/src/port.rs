//! Opening the link to the inverter: a serial port, or an in-process
//! emulator on a loopback bus.

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use gosolis_bus::{Bus, LocalBus, StreamBus};
use gosolis_device::DeviceEmulator;
use gosolis_transport::{TimeoutConfig, TimeoutReader};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{info, warn};

use crate::config::InverterConfig;
use crate::exit::{config_error, frame_error, serial_error, CliResult};

/// How long one driver-level read may block before it is retried.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub type SerialBus = StreamBus<TimeoutReader<Box<dyn SerialPort>>>;

/// A bus that can be shared by the command layer.
pub type DynBus = Box<dyn Bus + Send + Sync>;

/// Read half of a serial port that blocks until data arrives.
///
/// The driver times out every [`POLL_INTERVAL`]; those timeouts are retried
/// here so the [`TimeoutReader`] alone decides when a read has taken too long.
struct BlockingPort(Box<dyn SerialPort>);

impl Read for BlockingPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.0.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::TimedOut => continue,
                other => return other,
            }
        }
    }
}

/// Open the configured serial port (8N1, no flow control) as a bus.
pub fn open_serial(config: &InverterConfig) -> CliResult<SerialBus> {
    let name = config.require_port().map_err(config_error)?;

    let port = serialport::new(name, config.baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(POLL_INTERVAL)
        .open()
        .map_err(|err| serial_error(name, err))?;
    let reader = port.try_clone().map_err(|err| serial_error(name, err))?;

    info!(port = name, baud = config.baud, "opened serial port");

    let timeouts = TimeoutConfig {
        timeout: config.timeout(),
        ..TimeoutConfig::default()
    };
    StreamBus::with_timeout(BlockingPort(reader), port, timeouts)
        .map_err(|err| frame_error("failed to start serial reader", err))
}

/// Start an emulated inverter at the configured address and return the
/// controller side of the loopback bus.
///
/// The emulator thread ends when the returned bus is dropped.
pub fn open_loopback(config: &InverterConfig) -> CliResult<DynBus> {
    let (controller, mut interfaces) = LocalBus::new(1)
        .map_err(|err| frame_error("failed to start loopback bus", err))?
        .into_parts();
    let port = interfaces.remove(0);
    let address = config.address();

    thread::Builder::new()
        .name("gosolis-emulator".to_string())
        .spawn(move || {
            if let Err(err) = DeviceEmulator::new(port, address).run() {
                warn!(%err, "loopback emulator failed");
            }
        })
        .map_err(|err| crate::exit::io_error("failed to start emulator", err))?;

    info!(address = address.0, "serving requests from loopback emulator");
    Ok(Box::new(controller))
}

/// Open whichever link the command line asked for.
pub fn connect(config: &InverterConfig, loopback: bool) -> CliResult<DynBus> {
    if loopback {
        open_loopback(config)
    } else {
        Ok(Box::new(open_serial(config)?))
    }
}

#[cfg(test)]
mod tests {
    use gosolis_device::Device;

    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn loopback_link_answers_at_configured_address() {
        let config = InverterConfig {
            addr: 4,
            ..InverterConfig::default()
        };
        let bus = connect(&config, true).unwrap();
        let device = Device::new(&bus, config.address());

        device.ping().unwrap();
        assert_eq!(device.get_information().unwrap().grid.voltage, 240.0);
    }

    #[test]
    fn serial_link_needs_a_port() {
        let err = connect(&InverterConfig::default(), false)
            .err()
            .expect("connect should fail without a port");
        assert_eq!(err.code, USAGE);
    }
}
