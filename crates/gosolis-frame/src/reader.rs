use std::io::{ErrorKind, Read};

use tracing::{debug, trace, warn};

use crate::codec::{decode_ack, decode_frame, Frame, ACK_FRAME_SIZE, FRAME_SIZE, START_BYTE};
use crate::error::{FrameError, Result};

/// Reads frames from any `Read` stream.
///
/// Reads are issued with exactly the number of bytes the protocol needs, so
/// nothing past the end of a frame is consumed. Over a
/// [`TimeoutReader`](gosolis_transport::TimeoutReader), every block read is
/// bounded by one deadline.
pub struct FrameReader<T> {
    inner: T,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Consume bytes until the start marker has been read.
    pub fn wait_for_start(&mut self) -> Result<()> {
        let mut byte = [0u8; 1];
        let mut skipped = 0usize;
        loop {
            self.fill(&mut byte)?;
            if byte[0] == START_BYTE {
                if skipped > 0 {
                    trace!(skipped, "skipped bytes before start marker");
                }
                return Ok(());
            }
            skipped += 1;
        }
    }

    /// Read the next full frame (blocking).
    ///
    /// May fail with [`FrameError::Checksum`] and still carry the frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        self.wait_for_start()?;

        let mut block = [0u8; FRAME_SIZE];
        self.fill(&mut block)?;

        match decode_frame(&block) {
            Ok(frame) => {
                debug!(
                    address = frame.address.0,
                    command = %frame.command,
                    length = frame.length,
                    "frame received"
                );
                Ok(frame)
            }
            Err(err) => {
                warn!(%err, "discarding untrusted frame");
                Err(err)
            }
        }
    }

    /// Read the next acknowledgement frame (blocking).
    pub fn read_ack_frame(&mut self) -> Result<Frame> {
        self.wait_for_start()?;

        let mut block = [0u8; ACK_FRAME_SIZE];
        self.fill(&mut block)?;

        let frame = decode_ack(&block)?;
        debug!(address = frame.address.0, command = %frame.command, "ack received");
        Ok(frame)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
