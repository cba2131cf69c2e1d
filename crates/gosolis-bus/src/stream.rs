use std::io::{Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gosolis_frame::{Command, DeviceId, Frame, FrameReader, FrameWriter, Result};
use gosolis_transport::{TimeoutConfig, TimeoutReader};

use crate::traits::Bus;

/// Frame codec over a byte stream.
///
/// The stream is held behind a mutex, so one operation runs at a time. Reads
/// block for as long as the stream does; wrap the stream in a
/// [`TimeoutReader`] to bound them.
pub struct StreamBus<S> {
    stream: Mutex<S>,
}

impl<S: Read + Write> StreamBus<S> {
    /// Create a bus over `stream`.
    pub fn new(stream: S) -> Self {
        Self {
            stream: Mutex::new(stream),
        }
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.stream.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume the bus and return the stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write> StreamBus<TimeoutReader<W>> {
    /// Create a bus over a split stream with a read deadline.
    pub fn with_timeout<R>(reader: R, writer: W, config: TimeoutConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Ok(Self::new(TimeoutReader::new(reader, writer, config)?))
    }
}

impl<S: Read + Write> Bus for StreamBus<S> {
    fn read_frame(&self) -> Result<Frame> {
        let mut stream = self.lock();
        FrameReader::new(&mut *stream).read_frame()
    }

    fn read_ack_frame(&self) -> Result<Frame> {
        let mut stream = self.lock();
        FrameReader::new(&mut *stream).read_ack_frame()
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        let mut stream = self.lock();
        FrameWriter::new(&mut *stream).write_frame(frame)
    }

    fn write_ack(&self, address: DeviceId, command: Command) -> Result<()> {
        let mut stream = self.lock();
        FrameWriter::new(&mut *stream).write_ack(address, command)
    }
}

impl<S> std::fmt::Debug for StreamBus<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBus").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::time::Duration;

    use gosolis_frame::FrameError;

    use super::*;

    fn rewound(bus: StreamBus<Cursor<Vec<u8>>>) -> StreamBus<Cursor<Vec<u8>>> {
        let mut stream = bus.into_inner();
        stream.set_position(0);
        StreamBus::new(stream)
    }

    #[test]
    fn frames_and_acks_cross_the_stream() {
        let bus = StreamBus::new(Cursor::new(Vec::new()));
        let info = Frame::new(DeviceId(1), Command::GET_INFORMATION, vec![1, 2, 3]);
        bus.write_frame(&info).unwrap();
        bus.write_ack(DeviceId(1), Command::GRID_ON).unwrap();

        let bus = rewound(bus);
        assert_eq!(bus.read_frame().unwrap(), info);
        assert_eq!(
            bus.read_ack_frame().unwrap(),
            Frame::ack(DeviceId(1), Command::GRID_ON)
        );
        assert!(matches!(
            bus.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let bus = StreamBus::new(Cursor::new(Vec::new()));
        let err = bus
            .write_frame(&Frame::new(DeviceId(1), Command::LOG, vec![0; 64]))
            .unwrap_err();
        assert!(matches!(err, FrameError::IllegalFrame { .. }));
        assert!(bus.into_inner().into_inner().is_empty());
    }

    #[test]
    fn timeout_bus_reports_end_of_stream() {
        let bus = StreamBus::with_timeout(
            Cursor::new(vec![0x7E, 0x01, 0x06, 0x00]),
            io::sink(),
            TimeoutConfig {
                timeout: Duration::from_millis(200),
                capacity: 4,
            },
        )
        .unwrap();

        assert_eq!(
            bus.read_ack_frame().unwrap(),
            Frame::ack(DeviceId(1), Command::PING)
        );
        assert!(matches!(
            bus.read_ack_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[cfg(unix)]
    #[test]
    fn silent_peer_times_out() {
        let (near, _far) = std::os::unix::net::UnixStream::pair().unwrap();
        let bus = StreamBus::with_timeout(
            near,
            io::sink(),
            TimeoutConfig {
                timeout: Duration::from_millis(20),
                capacity: 4,
            },
        )
        .unwrap();

        assert!(bus.read_frame().unwrap_err().is_timeout());
    }
}
