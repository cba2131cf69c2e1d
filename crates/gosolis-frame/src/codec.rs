use bytes::{BufMut, Bytes, BytesMut};

use crate::command::{Command, DeviceId};
use crate::error::{FrameError, Result};

/// Start-of-frame marker.
pub const START_BYTE: u8 = 0x7E;

/// Maximum payload carried by one frame. The wire slot is always this size.
pub const MAX_PAYLOAD: usize = 50;

/// Full frame size excluding the start marker:
/// address (1) + command (1) + length (1) + payload slot (50) + checksum (1).
pub const FRAME_SIZE: usize = 54;

/// Ack frame size excluding the start marker: address + command + length.
pub const ACK_FRAME_SIZE: usize = 3;

const HEADER_SIZE: usize = 3;

/// A framed message addressed to one device.
///
/// Two frames are equal when they put the same bytes on the wire.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Device the frame is addressed to (requests) or sent by (responses).
    pub address: DeviceId,
    /// Command opcode.
    pub command: Command,
    /// Declared payload length as carried on the wire.
    pub length: u8,
    /// Payload bytes, without the zero padding of the wire slot.
    pub payload: Bytes,
    /// Slot bytes after the declared payload, as received. Empty for frames
    /// built locally.
    pub(crate) trailing: Bytes,
}

impl Frame {
    /// Create a frame whose declared length matches its payload.
    pub fn new(address: DeviceId, command: Command, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            address,
            command,
            length: u8::try_from(payload.len()).unwrap_or(u8::MAX),
            payload,
            trailing: Bytes::new(),
        }
    }

    /// A request with no payload.
    pub fn request(address: DeviceId, command: Command) -> Self {
        Self::new(address, command, Bytes::new())
    }

    /// The frame an acknowledgement decodes into.
    pub fn ack(address: DeviceId, command: Command) -> Self {
        Self::request(address, command)
    }

    /// The total wire size of a full frame, start marker included.
    pub fn wire_size(&self) -> usize {
        1 + FRAME_SIZE
    }

    /// The whole 50-byte data slot: payload, then whatever followed it on the
    /// wire, zero padded.
    ///
    /// Fixed-size records are read from here whatever the declared length.
    pub fn slot(&self) -> [u8; MAX_PAYLOAD] {
        let mut slot = [0u8; MAX_PAYLOAD];
        let bytes = self.payload.iter().chain(self.trailing.iter());
        for (dst, src) in slot.iter_mut().zip(bytes) {
            *dst = *src;
        }
        slot
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.command == other.command
            && self.length == other.length
            && self.payload == other.payload
            && self.slot() == other.slot()
    }
}

impl Eq for Frame {}

/// Mod-256 sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Encode a full frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────┬──────┬─────┬─────┬────────────────────────┬──────────┐
/// │ 0x7E  │ Addr │ Cmd │ Len │ Payload slot (50B,     │ Checksum │
/// │       │ (1B) │(1B) │(1B) │ zero padded)           │ (1B)     │
/// └───────┴──────┴─────┴─────┴────────────────────────┴──────────┘
/// ```
///
/// The checksum covers everything after the start marker. Payloads longer
/// than [`MAX_PAYLOAD`] are rejected before anything is written to `dst`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    if frame.payload.len() > MAX_PAYLOAD {
        return Err(FrameError::illegal("payload exceeds 50 bytes"));
    }

    dst.reserve(1 + FRAME_SIZE);
    dst.put_u8(START_BYTE);
    let body = dst.len();
    dst.put_u8(frame.address.0);
    dst.put_u8(frame.command.0);
    dst.put_u8(frame.length);
    dst.put_slice(&frame.slot());
    let sum = checksum(&dst[body..]);
    dst.put_u8(sum);
    Ok(())
}

/// Encode an acknowledgement. Acks carry no payload and no checksum.
pub fn encode_ack(address: DeviceId, command: Command, dst: &mut BytesMut) {
    dst.reserve(1 + ACK_FRAME_SIZE);
    dst.put_u8(START_BYTE);
    dst.put_u8(address.0);
    dst.put_u8(command.0);
    dst.put_u8(0);
}

/// Decode the block following a start marker into a frame.
///
/// A checksum mismatch still yields the decoded frame inside
/// [`FrameError::Checksum`].
pub fn decode_frame(block: &[u8; FRAME_SIZE]) -> Result<Frame> {
    let length = block[2];
    let used = usize::from(length).min(MAX_PAYLOAD);
    let frame = Frame {
        address: DeviceId(block[0]),
        command: Command(block[1]),
        length,
        payload: Bytes::copy_from_slice(&block[HEADER_SIZE..HEADER_SIZE + used]),
        trailing: Bytes::copy_from_slice(&block[HEADER_SIZE + used..HEADER_SIZE + MAX_PAYLOAD]),
    };

    let computed = checksum(&block[..FRAME_SIZE - 1]);
    let received = block[FRAME_SIZE - 1];
    if computed != received {
        return Err(FrameError::Checksum {
            frame: Box::new(frame),
            computed,
            received,
        });
    }

    Ok(frame)
}

/// Decode the block following a start marker into an ack frame.
pub fn decode_ack(block: &[u8; ACK_FRAME_SIZE]) -> Result<Frame> {
    let frame = Frame {
        address: DeviceId(block[0]),
        command: Command(block[1]),
        length: block[2],
        payload: Bytes::new(),
        trailing: Bytes::new(),
    };

    if frame.length != 0 {
        return Err(FrameError::illegal_frame("ack frame with payload", frame));
    }

    Ok(frame)
}
