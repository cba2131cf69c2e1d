use std::io;

use gosolis_transport::TransportError;

use crate::codec::Frame;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No byte arrived within the transport deadline.
    #[error("read timeout")]
    Timeout,

    /// The stream ended before a complete frame was received.
    #[error("connection closed (end of stream)")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(io::Error),

    /// The frame decoded but its checksum does not match. The frame is kept
    /// for diagnostics and must not be trusted.
    #[error("checksum error (computed {computed:#04x}, received {received:#04x})")]
    Checksum {
        frame: Box<Frame>,
        computed: u8,
        received: u8,
    },

    /// Structural violation: oversized payload on write, payload on an ack,
    /// or the wrong kind of frame delivered.
    #[error("illegal frame: {reason}")]
    IllegalFrame {
        reason: &'static str,
        frame: Option<Box<Frame>>,
    },
}

impl FrameError {
    pub(crate) fn illegal(reason: &'static str) -> Self {
        FrameError::IllegalFrame {
            reason,
            frame: None,
        }
    }

    /// Illegal frame error that keeps the offending frame.
    pub fn illegal_frame(reason: &'static str, frame: Frame) -> Self {
        FrameError::IllegalFrame {
            reason,
            frame: Some(Box::new(frame)),
        }
    }

    /// The untrusted frame attached to a checksum or illegal-frame error.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            FrameError::Checksum { frame, .. } => Some(frame),
            FrameError::IllegalFrame { frame, .. } => frame.as_deref(),
            _ => None,
        }
    }

    /// True if the error is a read deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Timeout)
    }
}

impl From<TransportError> for FrameError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => FrameError::Timeout,
            TransportError::EndOfStream => FrameError::ConnectionClosed,
            TransportError::Io(io) => FrameError::Io(io),
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        let kind = err.kind();
        let wraps_transport = err
            .get_ref()
            .is_some_and(|inner| inner.is::<TransportError>());

        if wraps_transport {
            // The timeout reader packs its TransportError into the io::Error.
            if let Some(Ok(inner)) = err.into_inner().map(|e| e.downcast::<TransportError>()) {
                return (*inner).into();
            }
            return FrameError::Io(io::Error::from(kind));
        }

        match kind {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FrameError::Timeout,
            io::ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
            _ => FrameError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
