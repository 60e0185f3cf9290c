//! Little-endian word-aligned buffers
//!
//! Both protocols are spoken little-endian here: the X11 setup packet
//! announces LSB-first, and Wayland always uses host order, which this crate
//! only supports on little-endian hosts.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use super::{pad, padded_len};

/// Failure to pull a value out of a received frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes remain than the field needs.
    #[error("needed {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A string argument is not NUL-terminated or not UTF-8.
    #[error("invalid string argument at offset {0}")]
    BadString(usize),

    /// A header field holds a value no valid frame can carry.
    #[error("invalid {0}")]
    Invalid(&'static str),
}

/// Failure to frame an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The request length does not fit the header's length field.
    #[error("request of {bytes} bytes exceeds the limit of {max_bytes} bytes")]
    TooLarge { bytes: usize, max_bytes: usize },
}

/// Growable request body. Every `put_*` appends in wire order.
#[derive(Debug, Default, Clone)]
pub struct WireBuf {
    bytes: Vec<u8>,
}

impl WireBuf {
    pub fn new() -> Self {
        WireBuf { bytes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        WireBuf {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        let mut word = [0u8; 2];
        LittleEndian::write_u16(&mut word, value);
        self.bytes.extend_from_slice(&word);
        self
    }

    pub fn put_i16(&mut self, value: i16) -> &mut Self {
        let mut word = [0u8; 2];
        LittleEndian::write_i16(&mut word, value);
        self.bytes.extend_from_slice(&word);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        let mut word = [0u8; 4];
        LittleEndian::write_u32(&mut word, value);
        self.bytes.extend_from_slice(&word);
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        let mut word = [0u8; 4];
        LittleEndian::write_i32(&mut word, value);
        self.bytes.extend_from_slice(&word);
        self
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn put_zeros(&mut self, count: usize) -> &mut Self {
        self.bytes.resize(self.bytes.len() + count, 0);
        self
    }

    /// Zero-fill up to the next 4-byte boundary.
    pub fn pad_to_word(&mut self) -> &mut Self {
        let padding = pad(self.bytes.len());
        self.put_zeros(padding)
    }

    /// Wayland string: length including the terminator, bytes, NUL, padding.
    pub fn put_string(&mut self, value: &str) -> &mut Self {
        self.put_u32(value.len() as u32 + 1);
        self.put_bytes(value.as_bytes());
        self.put_u8(0);
        self.pad_to_word()
    }

    /// Wayland 24.8 fixed-point value.
    pub fn put_fixed(&mut self, value: f64) -> &mut Self {
        self.put_i32((value * 256.0) as i32)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

/// Cursor over a received frame.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        WireReader { data, pos: 0 }
    }

    /// Starts reading at a fixed byte offset.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        WireReader { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        self.take(count).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn i16(&mut self) -> Result<i16, DecodeError> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        self.take(count)
    }

    /// Wayland 24.8 fixed-point value.
    pub fn fixed(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from(self.i32()?) / 256.0)
    }

    /// Wayland string argument. The length word counts the terminating NUL
    /// and the data is padded to a word boundary.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let len = self.u32()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let raw = self.take(padded_len(len))?;
        if raw[len - 1] != 0 {
            return Err(DecodeError::BadString(start));
        }
        std::str::from_utf8(&raw[..len - 1])
            .map(str::to_owned)
            .map_err(|_| DecodeError::BadString(start))
    }

    /// Wayland array argument, padding skipped.
    pub fn array(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.u32()? as usize;
        let raw = self.take(padded_len(len))?;
        Ok(&raw[..len])
    }
}
