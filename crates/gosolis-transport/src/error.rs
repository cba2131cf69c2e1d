use std::io;

/// Errors that can occur on a deadline-enforced transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No byte arrived before the read deadline. The peer has not failed.
    #[error("read timeout")]
    Timeout,

    /// The peer reached end-of-stream (e.g. the device was unplugged).
    #[error("end of stream")]
    EndOfStream,

    /// The peer reported an I/O error.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True if this is a deadline expiry rather than a peer failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io) => io,
            TransportError::Timeout => io::Error::new(io::ErrorKind::TimedOut, err),
            TransportError::EndOfStream => io::Error::new(io::ErrorKind::UnexpectedEof, err),
        }
    }
}

/// A read that stopped before the requested number of bytes arrived.
///
/// `received` bytes at the start of the caller's buffer are valid.
#[derive(Debug, thiserror::Error)]
#[error("{error} after {received} byte(s)")]
pub struct PartialRead {
    /// Number of bytes stored before the read stopped.
    pub received: usize,
    /// Why the read stopped.
    #[source]
    pub error: TransportError,
}

pub type Result<T> = std::result::Result<T, TransportError>;
