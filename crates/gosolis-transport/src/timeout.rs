use std::io::{self, ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{PartialRead, Result, TransportError};

/// Default read deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default number of bytes buffered between the receive thread and readers.
pub const DEFAULT_CAPACITY: usize = 16;

/// Configuration for a [`TimeoutReader`].
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Deadline for a single read call, measured from the start of the call.
    pub timeout: Duration,
    /// Inbox capacity in bytes. Zero makes every byte a rendezvous.
    pub capacity: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Failure recorded by the receive thread before it closes the inbox.
#[derive(Debug, Clone)]
enum PeerFailure {
    EndOfStream,
    Io(ErrorKind, String),
}

impl PeerFailure {
    fn to_error(&self) -> TransportError {
        match self {
            PeerFailure::EndOfStream => TransportError::EndOfStream,
            PeerFailure::Io(kind, message) => {
                TransportError::Io(io::Error::new(*kind, message.clone()))
            }
        }
    }
}

type FailureSlot = Arc<Mutex<Option<PeerFailure>>>;

/// A byte stream with a bounded-latency read.
///
/// A background thread performs blocking single-byte reads on the read half
/// and feeds them into a bounded inbox. Foreground reads pull from the inbox
/// until the buffer is full, the deadline passes, or the peer fails. Writes go
/// straight to the write half.
///
/// The deadline is computed once per read call and shared by every byte of
/// that call. A peer trickling bytes can therefore never stretch one call
/// beyond `timeout`, but a call asking for many bytes gets no more time than a
/// call asking for one.
///
/// Once the peer fails (including end-of-stream) the receive thread exits and
/// every subsequent read reports that failure, never a timeout.
pub struct TimeoutReader<W> {
    writer: W,
    inbox: Receiver<u8>,
    failure: FailureSlot,
    timeout: Duration,
    pending: Option<TransportError>,
}

impl<W: Write> TimeoutReader<W> {
    /// Wrap a split peer and start the receive thread.
    ///
    /// `reader` is moved onto the receive thread; it must be a handle to the
    /// same peer as `writer` (for a serial port, a `try_clone` of it).
    pub fn new<R>(reader: R, writer: W, config: TimeoutConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, inbox) = mpsc::sync_channel(config.capacity);
        let failure: FailureSlot = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&failure);
        thread::Builder::new()
            .name("gosolis-rx".to_string())
            .spawn(move || receive(reader, tx, slot))?;

        debug!(
            timeout_ms = config.timeout.as_millis() as u64,
            capacity = config.capacity,
            "timeout reader started"
        );

        Ok(Self {
            writer,
            inbox,
            failure,
            timeout: config.timeout,
            pending: None,
        })
    }
}

impl<W> TimeoutReader<W> {
    /// Fill `buf` completely or fail.
    ///
    /// On success returns `buf.len()`. On failure the first
    /// [`PartialRead::received`] bytes of `buf` hold what arrived before the
    /// deadline expired or the peer failed.
    pub fn read_timeout(&mut self, buf: &mut [u8]) -> std::result::Result<usize, PartialRead> {
        let deadline = Instant::now() + self.timeout;
        let wanted = buf.len();

        for (received, slot) in buf.iter_mut().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbox.recv_timeout(remaining) {
                Ok(byte) => *slot = byte,
                Err(RecvTimeoutError::Timeout) => {
                    trace!(received, wanted, "read deadline expired");
                    return Err(PartialRead {
                        received,
                        error: TransportError::Timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PartialRead {
                        received,
                        error: self.peer_failure(),
                    });
                }
            }
        }

        Ok(wanted)
    }

    /// Current read deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the read deadline for subsequent calls.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Borrow the write half.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Mutably borrow the write half.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    fn peer_failure(&self) -> TransportError {
        let slot = self.failure.lock().unwrap_or_else(|p| p.into_inner());
        match slot.as_ref() {
            Some(failure) => failure.to_error(),
            // The receive thread only exits after recording a failure, unless
            // it panicked.
            None => TransportError::Io(io::Error::other("receive thread terminated")),
        }
    }
}

fn receive<R: Read>(mut reader: R, tx: SyncSender<u8>, failure: FailureSlot) {
    let mut byte = [0u8; 1];
    let recorded = loop {
        match reader.read(&mut byte) {
            Ok(0) => break PeerFailure::EndOfStream,
            Ok(_) => {
                trace!(byte = byte[0], "rx");
                if tx.send(byte[0]).is_err() {
                    debug!("timeout reader dropped, receive thread exiting");
                    return;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => break PeerFailure::Io(err.kind(), err.to_string()),
        }
    };

    debug!(failure = ?recorded, "peer failed, closing inbox");
    *failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(recorded);
    // Dropping `tx` after recording lets readers observe the failure.
    drop(tx);
}

impl<W> Read for TimeoutReader<W> {
    /// Reads up to `buf.len()` bytes within one deadline.
    ///
    /// A partial fill is reported as a short read and the failure that cut it
    /// short is held back for the next call. A held-back peer failure is
    /// returned as is. A held-back timeout is returned only while nothing new
    /// has arrived; otherwise it is dropped and the read carries on with the
    /// new data. `read_exact` over this reader therefore spends at most one
    /// deadline. Errors carry the [`TransportError`] as their inner error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut filled = 0;
        match self.pending.take() {
            None => {}
            Some(TransportError::Timeout) => match self.inbox.try_recv() {
                Ok(byte) => {
                    buf[0] = byte;
                    filled = 1;
                }
                Err(TryRecvError::Empty) => return Err(TransportError::Timeout.into()),
                Err(TryRecvError::Disconnected) => return Err(self.peer_failure().into()),
            },
            Some(err) => return Err(err.into()),
        }

        match self.read_timeout(&mut buf[filled..]) {
            Ok(n) => Ok(filled + n),
            Err(PartialRead { received, error }) if filled + received > 0 => {
                self.pending = Some(error);
                Ok(filled + received)
            }
            Err(PartialRead { error, .. }) => Err(error.into()),
        }
    }
}

impl<W: Write> Write for TimeoutReader<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W> std::fmt::Debug for TimeoutReader<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutReader")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn config(timeout: Duration, capacity: usize) -> TimeoutConfig {
        TimeoutConfig { timeout, capacity }
    }

    #[test]
    fn end_of_stream_returns_gathered_bytes() {
        let reader = Cursor::new(vec![0u8, 1, 2, 3]);
        let mut trw =
            TimeoutReader::new(reader, io::sink(), config(Duration::from_secs(10), 0)).unwrap();

        let mut out = [0u8; 10];
        let err = trw.read_timeout(&mut out).unwrap_err();

        assert_eq!(err.received, 4);
        assert_eq!(&out[..4], &[0, 1, 2, 3]);
        assert!(matches!(err.error, TransportError::EndOfStream));
    }

    #[test]
    fn peer_failure_persists() {
        let reader = Cursor::new(vec![7u8]);
        let mut trw =
            TimeoutReader::new(reader, io::sink(), config(Duration::from_secs(5), 4)).unwrap();

        let mut one = [0u8; 1];
        assert_eq!(trw.read_timeout(&mut one).unwrap(), 1);
        assert_eq!(one[0], 7);

        for _ in 0..3 {
            let err = trw.read_timeout(&mut one).unwrap_err();
            assert_eq!(err.received, 0);
            assert!(matches!(err.error, TransportError::EndOfStream));
        }
    }

    #[test]
    fn silent_peer_times_out() {
        let (near, far) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut trw =
            TimeoutReader::new(near, io::sink(), config(Duration::from_millis(50), 0)).unwrap();

        let started = Instant::now();
        let mut out = [0u8; 4];
        let err = trw.read_timeout(&mut out).unwrap_err();

        assert!(err.error.is_timeout());
        assert_eq!(err.received, 0);
        assert!(started.elapsed() >= Duration::from_millis(50));
        drop(far);
    }

    #[test]
    fn bytes_arriving_after_timeout_are_kept() {
        let (near, mut far) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut trw =
            TimeoutReader::new(near, io::sink(), config(Duration::from_millis(30), 8)).unwrap();

        let mut out = [0u8; 2];
        assert!(trw.read_timeout(&mut out).unwrap_err().error.is_timeout());

        far.write_all(&[0xAA, 0x55]).unwrap();
        trw.set_timeout(Duration::from_secs(5));
        assert_eq!(trw.read_timeout(&mut out).unwrap(), 2);
        assert_eq!(out, [0xAA, 0x55]);
    }

    struct Trickle {
        interval: Duration,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.interval);
            buf[0] = 0x42;
            Ok(1)
        }
    }

    #[test]
    fn deadline_covers_whole_call() {
        let reader = Trickle {
            interval: Duration::from_millis(40),
        };
        let mut trw =
            TimeoutReader::new(reader, io::sink(), config(Duration::from_millis(100), 0))
                .unwrap();

        // Each byte arrives well within the deadline, but ten of them do not.
        let mut out = [0u8; 10];
        let err = trw.read_timeout(&mut out).unwrap_err();
        assert!(err.error.is_timeout());
        assert!(err.received < out.len());
    }

    struct Failing {
        interrupted: bool,
    }

    impl Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            Err(io::Error::new(ErrorKind::BrokenPipe, "line dropped"))
        }
    }

    #[test]
    fn peer_io_error_is_reported_not_timeout() {
        let reader = Failing { interrupted: false };
        let mut trw =
            TimeoutReader::new(reader, io::sink(), config(Duration::from_secs(5), 0)).unwrap();

        let mut out = [0u8; 1];
        let err = trw.read_timeout(&mut out).unwrap_err();
        match err.error {
            TransportError::Io(io) => assert_eq!(io.kind(), ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn io_read_reports_short_read_then_error() {
        let reader = Cursor::new(vec![1u8, 2]);
        let mut trw =
            TimeoutReader::new(reader, io::sink(), config(Duration::from_secs(5), 0)).unwrap();

        let mut out = [0u8; 4];
        assert_eq!(trw.read(&mut out).unwrap(), 2);
        let err = trw.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn io_read_exact_spends_one_deadline() {
        let timeout = Duration::from_millis(500);
        let reader = Trickle {
            interval: Duration::from_millis(200),
        };
        let mut trw = TimeoutReader::new(reader, io::sink(), config(timeout, 0)).unwrap();

        let started = Instant::now();
        let mut out = [0u8; 10];
        let err = trw.read_exact(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);

        let elapsed = started.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout * 2, "took {elapsed:?}");
    }

    #[test]
    fn held_back_timeout_gives_way_to_later_data() {
        let (near, mut far) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut trw =
            TimeoutReader::new(near, io::sink(), config(Duration::from_millis(100), 8)).unwrap();

        far.write_all(&[1]).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(trw.read(&mut out).unwrap(), 1);
        assert_eq!(out[0], 1);

        far.write_all(&[2, 3]).unwrap();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(trw.read(&mut out).unwrap(), 2);
        assert_eq!(&out[..2], &[2, 3]);

        // Nothing new this time, so the timeout from the last call stands.
        let err = trw.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn io_read_timeout_has_timed_out_kind() {
        let (near, _far) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut trw =
            TimeoutReader::new(near, io::sink(), config(Duration::from_millis(20), 0)).unwrap();

        let mut out = [0u8; 1];
        let err = trw.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn writes_pass_through_unbuffered() {
        let reader = Cursor::new(Vec::<u8>::new());
        let mut trw =
            TimeoutReader::new(reader, Vec::<u8>::new(), TimeoutConfig::default()).unwrap();

        trw.write_all(&[0x7E, 0x01, 0x06, 0x00]).unwrap();
        assert_eq!(trw.get_ref().as_slice(), &[0x7E, 0x01, 0x06, 0x00]);
    }
}
