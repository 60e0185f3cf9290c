//! X11 protocol requests
//!
//! Every request is a 4-byte header (opcode, one data byte, length in 4-byte
//! units) followed by the body and zero padding to a word boundary. Bodies are
//! built here and framed by [`encode_request`], so the length field and the
//! padding are computed in exactly one place.

use super::types::*;
use crate::protocol::{padded_len, EncodeError, WireBuf, WireReader};
use crate::protocol::DecodeError;

/// Size of the request header
pub const REQUEST_HEADER_LEN: usize = 4;

/// Largest request expressible without the BIG-REQUESTS extension, in words
pub const MAX_REQUEST_WORDS: usize = u16::MAX as usize;

/// X11 request opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestOpcode {
    CreateWindow = 1,
    DestroyWindow = 4,
    MapWindow = 8,
    InternAtom = 16,
    ChangeProperty = 18,
    CreateGC = 55,
    PutImage = 72,
}

/// Frame a request: header, body, optional bulk payload, zero padding.
pub fn encode_request(
    opcode: RequestOpcode,
    data: u8,
    body: &[u8],
    bulk: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let total = padded_len(REQUEST_HEADER_LEN + body.len() + bulk.len());
    let words = total / 4;
    if words > MAX_REQUEST_WORDS {
        return Err(EncodeError::TooLarge {
            bytes: total,
            max_bytes: MAX_REQUEST_WORDS * 4,
        });
    }

    let mut buf = WireBuf::with_capacity(total);
    buf.put_u8(opcode as u8)
        .put_u8(data)
        .put_u16(words as u16)
        .put_bytes(body)
        .put_bytes(bulk)
        .pad_to_word();
    Ok(buf.into_vec())
}

/// A request the client knows how to serialize
pub trait Request {
    const OPCODE: RequestOpcode;

    /// Value of the second header byte
    fn data_byte(&self) -> u8 {
        0
    }

    /// Fixed part of the request after the header
    fn write_body(&self, body: &mut WireBuf);

    /// Contiguous payload appended after the fixed part
    fn bulk(&self) -> &[u8] {
        &[]
    }

    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut body = WireBuf::new();
        self.write_body(&mut body);
        encode_request(Self::OPCODE, self.data_byte(), body.as_slice(), self.bulk())
    }
}

/// Create window request
#[derive(Debug, Clone)]
pub struct CreateWindow {
    pub depth: u8,
    pub wid: Window,
    pub parent: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub class: WindowClass,
    pub visual: VisualID,
    pub background_pixel: Option<u32>,
    pub event_mask: Option<u32>,
}

impl Request for CreateWindow {
    const OPCODE: RequestOpcode = RequestOpcode::CreateWindow;

    fn data_byte(&self) -> u8 {
        self.depth
    }

    fn write_body(&self, body: &mut WireBuf) {
        let mut value_mask = 0;
        if self.background_pixel.is_some() {
            value_mask |= window_attr::BACK_PIXEL;
        }
        if self.event_mask.is_some() {
            value_mask |= window_attr::EVENT_MASK;
        }

        body.put_u32(self.wid.id().get())
            .put_u32(self.parent.id().get())
            .put_i16(self.x)
            .put_i16(self.y)
            .put_u16(self.width)
            .put_u16(self.height)
            .put_u16(self.border_width)
            .put_u16(self.class as u16)
            .put_u32(self.visual.get())
            .put_u32(value_mask);

        // Values follow in ascending bit order
        if let Some(pixel) = self.background_pixel {
            body.put_u32(pixel);
        }
        if let Some(mask) = self.event_mask {
            body.put_u32(mask);
        }
    }
}

#[derive(Debug, Clone)]
pub struct DestroyWindow {
    pub window: Window,
}

impl Request for DestroyWindow {
    const OPCODE: RequestOpcode = RequestOpcode::DestroyWindow;

    fn write_body(&self, body: &mut WireBuf) {
        body.put_u32(self.window.id().get());
    }
}

#[derive(Debug, Clone)]
pub struct MapWindow {
    pub window: Window,
}

impl Request for MapWindow {
    const OPCODE: RequestOpcode = RequestOpcode::MapWindow;

    fn write_body(&self, body: &mut WireBuf) {
        body.put_u32(self.window.id().get());
    }
}

#[derive(Debug, Clone)]
pub struct InternAtom<'a> {
    pub only_if_exists: bool,
    pub name: &'a str,
}

impl Request for InternAtom<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::InternAtom;

    fn data_byte(&self) -> u8 {
        u8::from(self.only_if_exists)
    }

    fn write_body(&self, body: &mut WireBuf) {
        body.put_u16(self.name.len() as u16)
            .put_u16(0) // Unused
            .put_bytes(self.name.as_bytes());
    }
}

/// Reply to InternAtom: the atom sits at offset 8 of the 32-byte reply.
pub fn parse_intern_atom_reply(reply: &[u8]) -> Result<Atom, DecodeError> {
    WireReader::at(reply, 8).u32().map(Atom::new)
}

#[derive(Debug, Clone)]
pub struct ChangeProperty {
    pub mode: PropertyMode,
    pub window: Window,
    pub property: Atom,
    pub type_: Atom,
    /// Bits per element: 8, 16 or 32
    pub format: u8,
    pub data: Vec<u8>,
}

impl ChangeProperty {
    /// Replace a property with an 8-bit STRING value
    pub fn string(window: Window, property: Atom, value: &str) -> Self {
        ChangeProperty {
            mode: PropertyMode::Replace,
            window,
            property,
            type_: Atom::STRING,
            format: 8,
            data: value.as_bytes().to_vec(),
        }
    }

    /// Replace a property with a list of 32-bit ATOM values
    pub fn atoms(window: Window, property: Atom, atoms: &[Atom]) -> Self {
        let mut data = WireBuf::with_capacity(atoms.len() * 4);
        for atom in atoms {
            data.put_u32(atom.get());
        }
        ChangeProperty {
            mode: PropertyMode::Replace,
            window,
            property,
            type_: Atom::ATOM,
            format: 32,
            data: data.into_vec(),
        }
    }

    /// Length of the data in format units
    pub fn element_count(&self) -> u32 {
        match self.format {
            16 => (self.data.len() / 2) as u32,
            32 => (self.data.len() / 4) as u32,
            _ => self.data.len() as u32,
        }
    }
}

impl Request for ChangeProperty {
    const OPCODE: RequestOpcode = RequestOpcode::ChangeProperty;

    fn data_byte(&self) -> u8 {
        self.mode as u8
    }

    fn write_body(&self, body: &mut WireBuf) {
        body.put_u32(self.window.id().get())
            .put_u32(self.property.get())
            .put_u32(self.type_.get())
            .put_u8(self.format)
            .put_zeros(3) // Unused
            .put_u32(self.element_count());
    }

    fn bulk(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone)]
pub struct CreateGC {
    pub cid: GContext,
    pub drawable: Window,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

impl Request for CreateGC {
    const OPCODE: RequestOpcode = RequestOpcode::CreateGC;

    fn write_body(&self, body: &mut WireBuf) {
        let mut value_mask = 0;
        if self.foreground.is_some() {
            value_mask |= gc_attr::FOREGROUND;
        }
        if self.background.is_some() {
            value_mask |= gc_attr::BACKGROUND;
        }

        body.put_u32(self.cid.id().get())
            .put_u32(self.drawable.id().get())
            .put_u32(value_mask);
        if let Some(pixel) = self.foreground {
            body.put_u32(pixel);
        }
        if let Some(pixel) = self.background {
            body.put_u32(pixel);
        }
    }
}

/// PutImage with the pixel payload carried inline after the fixed part
#[derive(Debug, Clone)]
pub struct PutImage<'a> {
    pub format: ImageFormat,
    pub drawable: Window,
    pub gc: GContext,
    pub width: u16,
    pub height: u16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub left_pad: u8,
    pub depth: u8,
    pub data: &'a [u8],
}

impl PutImage<'_> {
    /// Header plus fixed part, before the pixel payload
    pub const FIXED_LEN: usize = REQUEST_HEADER_LEN + 20;

    /// How many rows of `row_bytes` fit into one request of at most
    /// `max_request_words` words.
    pub fn rows_per_request(row_bytes: usize, max_request_words: usize) -> usize {
        let budget = (max_request_words * 4).saturating_sub(Self::FIXED_LEN);
        if row_bytes == 0 {
            return 0;
        }
        budget / row_bytes
    }
}

impl Request for PutImage<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::PutImage;

    fn data_byte(&self) -> u8 {
        self.format as u8
    }

    fn write_body(&self, body: &mut WireBuf) {
        body.put_u32(self.drawable.id().get())
            .put_u32(self.gc.id().get())
            .put_u16(self.width)
            .put_u16(self.height)
            .put_i16(self.dst_x)
            .put_i16(self.dst_y)
            .put_u8(self.left_pad)
            .put_u8(self.depth)
            .put_u16(0); // Unused
    }

    fn bulk(&self) -> &[u8] {
        self.data
    }
}
