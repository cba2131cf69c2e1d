//! Command layer for Solis inverters.
//!
//! [`Device`] issues requests to one inverter over any
//! [`Bus`](gosolis_bus::Bus) and decodes the replies. [`DeviceEmulator`]
//! answers the same protocol and is the usual peer in tests and loopback
//! setups.

pub mod device;
pub mod emulator;
pub mod error;
pub mod info;

pub use device::Device;
pub use emulator::{default_information, DeviceEmulator, Handler};
pub use error::{DeviceError, Result};
pub use info::{
    DeviceInformation, DeviceStatus, FaultCode, GridInformation, GridStatus, InputStatus,
    PowerCurve, PowerStandard, ProductionInformation, Product, RawDeviceInfo, SerialNumber,
    SoftwareVersion, RECORD_SIZE,
};
