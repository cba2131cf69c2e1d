//! Bus abstraction for the Solis RS-485 protocol.
//!
//! A [`Bus`] moves full frames and acknowledgements between a controller and
//! the devices it talks to. Two implementations ship here:
//! - [`StreamBus`], the frame codec over any byte stream (normally a serial
//!   port behind a [`TimeoutReader`](gosolis_transport::TimeoutReader))
//! - [`LocalBus`], an in-process loopback used to pair a controller with
//!   emulated devices

pub mod local;
pub mod stream;
pub mod traits;

pub use local::{LocalBus, LocalInterface};
pub use stream::StreamBus;
pub use traits::Bus;
