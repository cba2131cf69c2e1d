use std::sync::Arc;

use gosolis_frame::{Command, DeviceId, Frame, Result};

/// A half-duplex link carrying frames and acknowledgements.
///
/// All methods take `&self` so one bus can be shared between a device handle
/// and the code that owns it. Implementations serialise access internally.
pub trait Bus {
    /// Block until the next full frame arrives.
    fn read_frame(&self) -> Result<Frame>;

    /// Block until the next acknowledgement arrives.
    fn read_ack_frame(&self) -> Result<Frame>;

    /// Send a full frame.
    fn write_frame(&self, frame: &Frame) -> Result<()>;

    /// Acknowledge `command` on behalf of `address`.
    fn write_ack(&self, address: DeviceId, command: Command) -> Result<()>;
}

impl<B: Bus + ?Sized> Bus for &B {
    fn read_frame(&self) -> Result<Frame> {
        (**self).read_frame()
    }

    fn read_ack_frame(&self) -> Result<Frame> {
        (**self).read_ack_frame()
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn write_ack(&self, address: DeviceId, command: Command) -> Result<()> {
        (**self).write_ack(address, command)
    }
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn read_frame(&self) -> Result<Frame> {
        (**self).read_frame()
    }

    fn read_ack_frame(&self) -> Result<Frame> {
        (**self).read_ack_frame()
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn write_ack(&self, address: DeviceId, command: Command) -> Result<()> {
        (**self).write_ack(address, command)
    }
}

impl<B: Bus + ?Sized> Bus for Arc<B> {
    fn read_frame(&self) -> Result<Frame> {
        (**self).read_frame()
    }

    fn read_ack_frame(&self) -> Result<Frame> {
        (**self).read_ack_frame()
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn write_ack(&self, address: DeviceId, command: Command) -> Result<()> {
        (**self).write_ack(address, command)
    }
}
