//! Device addresses and command opcodes.
//!
//! Opcode values are fixed by the inverter firmware and must match exactly.

use std::fmt;

/// Address of a device on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DeviceId(pub u8);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for DeviceId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<DeviceId> for u8 {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

/// Command opcode carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Command(pub u8);

impl Command {
    /// Connect the inverter to the grid.
    pub const GRID_ON: Command = Command(0x02);
    /// Disconnect the inverter from the grid.
    pub const GRID_OFF: Command = Command(0x03);
    pub const SET_POWER_STANDARD: Command = Command(0x05);
    /// Liveness probe, answered with an ack.
    pub const PING: Command = Command(0x06);
    /// Telemetry snapshot, answered with a full frame.
    pub const GET_INFORMATION: Command = Command(0xA1);
    pub const GET_POWER_CURVE: Command = Command(0xA3);
    pub const SELECT_POWER_CURVE: Command = Command(0xA4);
    pub const UPDATE_POWER_CURVE: Command = Command(0xAA);
    pub const LOG: Command = Command(0xC1);

    /// Returns a human-readable name for the opcode.
    pub fn name(self) -> &'static str {
        match self {
            Self::GRID_ON => "GRID_ON",
            Self::GRID_OFF => "GRID_OFF",
            Self::SET_POWER_STANDARD => "SET_POWER_STANDARD",
            Self::PING => "PING",
            Self::GET_INFORMATION => "GET_INFORMATION",
            Self::GET_POWER_CURVE => "GET_POWER_CURVE",
            Self::SELECT_POWER_CURVE => "SELECT_POWER_CURVE",
            Self::UPDATE_POWER_CURVE => "UPDATE_POWER_CURVE",
            Self::LOG => "LOG",
            _ => "UNKNOWN",
        }
    }

    /// Returns true if the opcode is one the firmware is known to accept.
    pub fn is_known(self) -> bool {
        self.name() != "UNKNOWN"
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.0)
    }
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<Command> for u8 {
    fn from(value: Command) -> Self {
        value.0
    }
}
