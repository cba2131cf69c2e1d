use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use gosolis_bus::Bus;
use gosolis_frame::{Command, DeviceId, Frame, FrameError};
use tracing::{debug, info, trace, warn};

use crate::error::{DeviceError, Result};
use crate::info::{
    DeviceInformation, DeviceStatus, FaultCode, GridInformation, GridStatus, InputStatus,
    PowerCurve, PowerStandard, ProductionInformation, Product, SerialNumber, SoftwareVersion,
};

/// Handles one request addressed to the emulator.
pub type Handler<B> = fn(&DeviceEmulator<B>, &Frame) -> Result<()>;

/// Snapshot served by a fresh emulator.
pub fn default_information() -> DeviceInformation {
    DeviceInformation {
        inputs: vec![InputStatus {
            voltage: 42.0,
            current: 1.0,
        }],
        grid: GridInformation {
            voltage: 240.0,
            current: 0.4,
            frequency: 50.0,
            power_standard: PowerStandard::G59G83,
            grid_status: GridStatus(0xbe),
        },
        production: ProductionInformation {
            total: 123_456.0,
            month: 256.0,
            last_month: 512.0,
            today: 42.0,
            yesterday: 31.0,
        },
        temperature: 21.1,
        product: Product(0x96),
        software_version: SoftwareVersion(0xf),
        serial_number: SerialNumber([1, 2, 3, 4, 5, 6, 7, 8]),
        status: DeviceStatus(0x0001),
        error: FaultCode(0x0000),
        power_curve: PowerCurve(0x04),
    }
}

/// Answers the inverter protocol on a bus, for testing without hardware.
///
/// Frames for other addresses and unreadable frames are expected on a shared
/// medium and are skipped.
pub struct DeviceEmulator<B> {
    bus: B,
    address: DeviceId,
    information: RwLock<DeviceInformation>,
    handlers: HashMap<Command, Handler<B>>,
}

impl<B: Bus> DeviceEmulator<B> {
    /// Emulate the device at `address`, serving [`default_information`].
    pub fn new(bus: B, address: DeviceId) -> Self {
        let mut handlers: HashMap<Command, Handler<B>> = HashMap::new();
        for command in [
            Command::GRID_ON,
            Command::GRID_OFF,
            Command::SET_POWER_STANDARD,
            Command::PING,
            Command::SELECT_POWER_CURVE,
            Command::UPDATE_POWER_CURVE,
            Command::LOG,
        ] {
            handlers.insert(command, Self::ack_ignored);
        }
        handlers.insert(Command::GET_INFORMATION, Self::get_information);

        Self {
            bus,
            address,
            information: RwLock::new(default_information()),
            handlers,
        }
    }

    /// Replace the served snapshot.
    pub fn with_information(self, information: DeviceInformation) -> Self {
        self.set_information(information);
        self
    }

    /// Install or replace the handler for `command`.
    pub fn with_handler(mut self, command: Command, handler: Handler<B>) -> Self {
        self.handlers.insert(command, handler);
        self
    }

    pub fn address(&self) -> DeviceId {
        self.address
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Copy of the served snapshot.
    pub fn information(&self) -> DeviceInformation {
        self.information
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the served snapshot. Takes effect for the next request.
    pub fn set_information(&self, information: DeviceInformation) {
        *self
            .information
            .write()
            .unwrap_or_else(PoisonError::into_inner) = information;
    }

    /// Serve requests until the bus closes.
    ///
    /// Returns `Ok(())` on end of stream and the error on an I/O failure.
    pub fn run(&self) -> Result<()> {
        info!(address = self.address.0, "emulator started");
        loop {
            let frame = match self.bus.read_frame() {
                Ok(frame) => frame,
                Err(err) => match Self::classify(err) {
                    Some(result) => return result,
                    None => continue,
                },
            };

            if frame.address != self.address {
                trace!(address = frame.address.0, "ignoring frame for other device");
                continue;
            }

            let Some(handler) = self.handlers.get(&frame.command) else {
                warn!(command = %frame.command, "unexpected command");
                continue;
            };

            debug!(command = %frame.command, "handling request");
            if let Err(err) = handler(self, &frame) {
                match err {
                    DeviceError::Frame(err) => match Self::classify(err) {
                        Some(result) => return result,
                        None => continue,
                    },
                    other => warn!(command = %frame.command, err = %other, "request failed"),
                }
            }
        }
    }

    /// Acknowledge `request` from this device.
    pub fn send_ack(&self, request: &Frame) -> Result<()> {
        Ok(self.bus.write_ack(self.address, request.command)?)
    }

    /// Answer `request` with a full frame carrying `payload`.
    pub fn send_response(&self, request: &Frame, payload: Bytes) -> Result<()> {
        let response = Frame::new(self.address, request.command, payload);
        Ok(self.bus.write_frame(&response)?)
    }

    fn ack_ignored(&self, request: &Frame) -> Result<()> {
        self.send_ack(request)
    }

    fn get_information(&self, request: &Frame) -> Result<()> {
        let payload = self.information().encode();
        self.send_response(request, payload)
    }

    /// `Some` when the error ends the serve loop, `None` when it is noise.
    fn classify(err: FrameError) -> Option<Result<()>> {
        match err {
            FrameError::ConnectionClosed => {
                info!("bus closed, emulator stopping");
                Some(Ok(()))
            }
            FrameError::Io(err) => Some(Err(FrameError::Io(err).into())),
            other => {
                trace!(err = %other, "skipping unreadable frame");
                None
            }
        }
    }
}

impl<B> std::fmt::Debug for DeviceEmulator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEmulator")
            .field("address", &self.address)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
