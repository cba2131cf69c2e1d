//! Wire framing and checksum codec for the Solis RS-485 protocol.
//!
//! Every message on the bus starts with a `0x7E` marker. Full frames carry a
//! fixed 54-byte block:
//! - device address (1 byte)
//! - command opcode (1 byte)
//! - declared payload length (1 byte, at most 50)
//! - a 50-byte zero-padded payload slot
//! - a mod-256 checksum over the 53 preceding bytes
//!
//! Acknowledgements carry only address, command and a zero length byte, with
//! no checksum. Which of the two a reader expects is decided by context.

pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    checksum, decode_ack, decode_frame, encode_ack, encode_frame, Frame, ACK_FRAME_SIZE,
    FRAME_SIZE, MAX_PAYLOAD, START_BYTE,
};
pub use command::{Command, DeviceId};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
