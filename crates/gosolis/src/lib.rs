//! Control and monitor Ginlong Solis inverters.
//!
//! gosolis speaks the Solis RS-485 request/response protocol: fixed-size
//! checksummed frames on a shared half-duplex line, one outstanding request at
//! a time.
//!
//! # Crate Structure
//!
//! - [`transport`]: deadline-enforcing reader over a blocking byte stream
//! - [`frame`]: wire codec, opcodes and frame errors
//! - [`bus`]: the [`Bus`](bus::Bus) trait, stream bus and in-process loopback bus
//! - [`device`]: command client, telemetry record and device emulator

/// Re-export transport types.
pub mod transport {
    pub use gosolis_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gosolis_frame::*;
}

/// Re-export bus types.
pub mod bus {
    pub use gosolis_bus::*;
}

/// Re-export device types.
pub mod device {
    pub use gosolis_device::*;
}
