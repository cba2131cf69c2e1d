use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{encode_ack, encode_frame, Frame, FRAME_SIZE};
use crate::command::{Command, DeviceId};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(1 + FRAME_SIZE),
        }
    }

    /// Write a complete frame (blocking).
    ///
    /// Frames with more than 50 payload bytes are rejected and nothing is
    /// written.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;
        self.send()?;
        debug!(
            address = frame.address.0,
            command = %frame.command,
            length = frame.length,
            "frame sent"
        );
        Ok(())
    }

    /// Write an acknowledgement for `command` on behalf of `address`.
    pub fn write_ack(&mut self, address: DeviceId, command: Command) -> Result<()> {
        self.buf.clear();
        encode_ack(address, command, &mut self.buf);
        self.send()?;
        debug!(address = address.0, command = %command, "ack sent");
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn send(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::reader::FrameReader;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_frame_pads_slot_and_checksums() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let frame = Frame {
            address: DeviceId(0x01),
            command: Command(0x42),
            length: 2,
            payload: Bytes::from_static(&[3, 4, 5]),
            trailing: Bytes::new(),
        };

        writer.write_frame(&frame).unwrap();

        let wire = written(writer);
        let mut expected = vec![0u8; 55];
        expected[..7].copy_from_slice(&[0x7E, 0x01, 0x42, 2, 3, 4, 5]);
        expected[54] = 0x51;
        assert_eq!(wire, expected);
    }

    #[test]
    fn write_ack_is_four_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.write_ack(DeviceId(0x10), Command(0x11)).unwrap();
        assert_eq!(written(writer), vec![0x7E, 0x10, 0x11, 0x00]);
    }

    #[test]
    fn oversized_frame_writes_nothing() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let frame = Frame::new(DeviceId(1), Command::LOG, vec![0u8; 51]);

        let err = writer.write_frame(&frame).unwrap_err();
        assert!(matches!(err, FrameError::IllegalFrame { .. }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn written_frames_read_back_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer
            .write_frame(&Frame::request(DeviceId(1), Command::PING))
            .unwrap();
        writer.write_ack(DeviceId(1), Command::PING).unwrap();
        writer
            .write_frame(&Frame::new(DeviceId(2), Command::LOG, b"z".to_vec()))
            .unwrap();

        let mut reader = FrameReader::new(Cursor::new(written(writer)));
        assert_eq!(
            reader.read_frame().unwrap(),
            Frame::request(DeviceId(1), Command::PING)
        );
        assert_eq!(
            reader.read_ack_frame().unwrap(),
            Frame::ack(DeviceId(1), Command::PING)
        );
        let log = reader.read_frame().unwrap();
        assert_eq!(log.address, DeviceId(2));
        assert_eq!(log.payload.as_ref(), b"z");
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.write_ack(DeviceId(1), Command::GRID_ON).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let mut writer = FrameWriter::new(InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        });
        writer
            .write_frame(&Frame::request(DeviceId(5), Command::GRID_OFF))
            .unwrap();

        assert_eq!(writer.into_inner().data.len(), 55);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.write_ack(DeviceId(1), Command::PING).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_timeout_maps_to_timeout() {
        let mut writer = FrameWriter::new(FailingWriter(ErrorKind::TimedOut));
        let err = writer.write_ack(DeviceId(1), Command::PING).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn write_failure_is_io() {
        let mut writer = FrameWriter::new(FailingWriter(ErrorKind::PermissionDenied));
        let err = writer.write_ack(DeviceId(1), Command::PING).unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::PermissionDenied));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter(ErrorKind);

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(self.0))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
