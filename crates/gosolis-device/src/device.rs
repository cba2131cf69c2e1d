use gosolis_bus::Bus;
use gosolis_frame::{Command, DeviceId, Frame};
use tracing::debug;

use crate::error::{DeviceError, Result};
use crate::info::DeviceInformation;

/// Command/response client for one inverter.
///
/// Each call writes one request and blocks for the matching reply. Nothing is
/// kept between calls, so several devices may share one bus as long as only
/// one request is outstanding at a time.
#[derive(Debug)]
pub struct Device<B> {
    bus: B,
    address: DeviceId,
}

impl<B: Bus> Device<B> {
    /// Bind to the device at `address` on `bus`.
    pub fn new(bus: B, address: DeviceId) -> Self {
        Self { bus, address }
    }

    /// Address this handle talks to.
    pub fn address(&self) -> DeviceId {
        self.address
    }

    /// Borrow the bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Release the bus.
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Check that the device answers.
    pub fn ping(&self) -> Result<()> {
        self.send_acked_command(Command::PING)
    }

    /// Connect the inverter to the grid.
    pub fn grid_on(&self) -> Result<()> {
        self.send_acked_command(Command::GRID_ON)
    }

    /// Disconnect the inverter from the grid.
    pub fn grid_off(&self) -> Result<()> {
        self.send_acked_command(Command::GRID_OFF)
    }

    /// Read the current telemetry snapshot.
    ///
    /// The record is read from the whole data slot; the declared length is
    /// not trusted.
    pub fn get_information(&self) -> Result<DeviceInformation> {
        let frame = self.send_command(Command::GET_INFORMATION)?;
        DeviceInformation::decode(&frame.slot())
    }

    fn send_acked_command(&self, command: Command) -> Result<()> {
        self.request(command)?;
        let ack = self.bus.read_ack_frame()?;
        self.verify_response(ack, command)?;
        Ok(())
    }

    fn send_command(&self, command: Command) -> Result<Frame> {
        self.request(command)?;
        let frame = self.bus.read_frame()?;
        self.verify_response(frame, command)
    }

    fn request(&self, command: Command) -> Result<()> {
        debug!(address = self.address.0, %command, "sending request");
        self.bus
            .write_frame(&Frame::request(self.address, command))
            .map_err(DeviceError::from)
    }

    fn verify_response(&self, frame: Frame, command: Command) -> Result<Frame> {
        if frame.address != self.address || frame.command != command {
            return Err(DeviceError::IllegalResponse {
                expected_address: self.address,
                expected_command: command,
                frame: Box::new(frame),
            });
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use gosolis_frame::{FrameError, Result as FrameResult};

    use super::*;
    use crate::info::RECORD_SIZE;

    /// Bus that replays canned replies and records requests.
    #[derive(Default)]
    struct ScriptedBus {
        replies: Mutex<VecDeque<FrameResult<Frame>>>,
        requests: Mutex<Vec<Frame>>,
    }

    impl ScriptedBus {
        fn replying(replies: Vec<FrameResult<Frame>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            }
        }

        fn next(&self) -> FrameResult<Frame> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FrameError::Timeout))
        }
    }

    impl Bus for ScriptedBus {
        fn read_frame(&self) -> FrameResult<Frame> {
            self.next()
        }

        fn read_ack_frame(&self) -> FrameResult<Frame> {
            self.next()
        }

        fn write_frame(&self, frame: &Frame) -> FrameResult<()> {
            self.requests.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn write_ack(&self, _address: DeviceId, _command: Command) -> FrameResult<()> {
            unreachable!("devices never ack")
        }
    }

    #[test]
    fn ping_sends_empty_request_and_accepts_matching_ack() {
        let bus = ScriptedBus::replying(vec![Ok(Frame::ack(DeviceId(3), Command::PING))]);
        let device = Device::new(&bus, DeviceId(3));

        device.ping().unwrap();

        let requests = bus.requests.lock().unwrap();
        assert_eq!(
            requests.as_slice(),
            &[Frame::request(DeviceId(3), Command::PING)]
        );
    }

    #[test]
    fn ack_from_other_device_is_illegal() {
        let bus = ScriptedBus::replying(vec![Ok(Frame::ack(DeviceId(2), Command::GRID_ON))]);
        let device = Device::new(&bus, DeviceId(1));

        let err = device.grid_on().unwrap_err();
        assert!(matches!(
            err,
            DeviceError::IllegalResponse {
                expected_address: DeviceId(1),
                expected_command: Command::GRID_ON,
                ..
            }
        ));
        assert_eq!(err.frame().unwrap().address, DeviceId(2));
    }

    #[test]
    fn ack_for_other_command_is_illegal() {
        let bus = ScriptedBus::replying(vec![Ok(Frame::ack(DeviceId(1), Command::GRID_ON))]);
        let device = Device::new(&bus, DeviceId(1));

        let err = device.grid_off().unwrap_err();
        assert!(matches!(err, DeviceError::IllegalResponse { .. }));
    }

    #[test]
    fn transport_errors_propagate_unchanged() {
        let bus = ScriptedBus::default();
        let device = Device::new(&bus, DeviceId(1));
        assert!(device.ping().unwrap_err().is_timeout());

        let bus = ScriptedBus::replying(vec![Err(FrameError::illegal_frame(
            "ack frame with payload",
            Frame::ack(DeviceId(1), Command::PING),
        ))]);
        let device = Device::new(&bus, DeviceId(1));
        assert!(matches!(
            device.ping().unwrap_err(),
            DeviceError::Frame(FrameError::IllegalFrame { .. })
        ));
    }

    #[test]
    fn get_information_decodes_payload() {
        let mut payload = vec![0u8; RECORD_SIZE];
        payload[4..6].copy_from_slice(&2420u16.to_le_bytes());
        let bus = ScriptedBus::replying(vec![Ok(Frame::new(
            DeviceId(1),
            Command::GET_INFORMATION,
            payload,
        ))]);
        let device = Device::new(&bus, DeviceId(1));

        let info = device.get_information().unwrap();
        assert_eq!(info.grid.voltage, 242.0);
        assert_eq!(info.inputs.len(), 2);
    }

    #[test]
    fn get_information_reads_past_short_payload() {
        let mut payload = vec![0u8; 10];
        payload[4..6].copy_from_slice(&2300u16.to_le_bytes());
        let bus = ScriptedBus::replying(vec![Ok(Frame::new(
            DeviceId(1),
            Command::GET_INFORMATION,
            payload,
        ))]);
        let device = Device::new(&bus, DeviceId(1));

        let info = device.get_information().unwrap();
        assert_eq!(info.grid.voltage, 230.0);
        assert_eq!(info.production.total, 0.0);
    }
}
