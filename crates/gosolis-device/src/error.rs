use gosolis_frame::{Command, DeviceId, Frame, FrameError};

use crate::info::RECORD_SIZE;

/// Errors that can occur talking to a device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport or framing error, propagated unchanged.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The reply does not belong to the request that was sent.
    #[error(
        "illegal response: expected {expected_command} from device {expected_address}, \
         got {} from device {}",
        frame.command,
        frame.address
    )]
    IllegalResponse {
        expected_address: DeviceId,
        expected_command: Command,
        frame: Box<Frame>,
    },

    /// Information payload shorter than the packed record.
    #[error("device information record too short: {len} bytes, need {}", RECORD_SIZE)]
    ShortRecord { len: usize },
}

impl DeviceError {
    /// True if the device did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Frame(err) if err.is_timeout())
    }

    /// The frame that caused the error, if one was received.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            DeviceError::Frame(err) => err.frame(),
            DeviceError::IllegalResponse { frame, .. } => Some(frame),
            DeviceError::ShortRecord { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
