//! Wayland core and xdg-shell wire subset
//!
//! A message is an 8-byte header followed by word-aligned arguments. The
//! header carries the target object id and a second word packing the total
//! message size (header included) in the high 16 bits and the opcode in the
//! low 16 bits.

pub mod events;
pub mod interfaces;
pub mod requests;

pub use events::*;
pub use interfaces::*;
pub use requests::*;

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::protocol::{DecodeError, EncodeError, WireBuf};

/// Size of every message header
pub const HEADER_LEN: usize = 8;

/// Largest message the 16-bit size field can describe
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Numeric object id, scoped to one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Null object, used for "no buffer" in attach
    pub const NULL: ObjectId = ObjectId(0);
    /// The display singleton exists from the moment the socket connects
    pub const DISPLAY: ObjectId = ObjectId(1);

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Decoded message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub object: ObjectId,
    pub opcode: u16,
    /// Total size including the header
    pub size: u16,
}

impl MessageHeader {
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, DecodeError> {
        let object = ObjectId(LittleEndian::read_u32(&bytes[0..4]));
        let word = LittleEndian::read_u32(&bytes[4..8]);
        let header = MessageHeader {
            object,
            opcode: (word & 0xffff) as u16,
            size: (word >> 16) as u16,
        };
        if (header.size as usize) < HEADER_LEN || header.size % 4 != 0 {
            return Err(DecodeError::Invalid("message size"));
        }
        Ok(header)
    }

    /// Bytes following the header
    pub fn payload_len(&self) -> usize {
        self.size as usize - HEADER_LEN
    }
}

/// Frame a message for `object` with the given, already padded, arguments.
pub fn encode_message(object: ObjectId, opcode: u16, args: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let size = HEADER_LEN + args.len();
    if size > MAX_MESSAGE_LEN {
        return Err(EncodeError::TooLarge {
            bytes: size,
            max_bytes: MAX_MESSAGE_LEN,
        });
    }
    let mut buf = WireBuf::with_capacity(size);
    buf.put_u32(object.get())
        .put_u32(((size as u32) << 16) | u32::from(opcode))
        .put_bytes(args);
    Ok(buf.into_vec())
}
