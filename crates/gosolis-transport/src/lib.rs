//! Deadline-enforcing transport for half-duplex serial links.
//!
//! Serial ports and similar byte streams block indefinitely when the far end
//! stays silent. [`TimeoutReader`] moves the blocking reads onto a background
//! thread and gives callers a read primitive that fails with
//! [`TransportError::Timeout`] once a deadline passes.
//!
//! This is the lowest layer of gosolis. The frame codec and the stream bus
//! build on top of it.

pub mod error;
pub mod timeout;

pub use error::{PartialRead, Result, TransportError};
pub use timeout::{TimeoutConfig, TimeoutReader, DEFAULT_CAPACITY, DEFAULT_TIMEOUT};
