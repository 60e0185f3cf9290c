//! X11 protocol events
//!
//! Every event, error and reply header the server sends is a 32-byte frame.
//! Byte 0 holds the code; its top bit only marks events delivered through
//! SendEvent and is masked off before matching.

use super::types::*;
use super::FRAME_LEN;
use crate::protocol::{DecodeError, WireBuf, WireReader};

/// Event type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    KeyPress = 2,
    KeyRelease = 3,
    ButtonPress = 4,
    ButtonRelease = 5,
    MotionNotify = 6,
    Expose = 12,
    ConfigureNotify = 22,
    ClientMessage = 33,
}

/// Code byte of an error frame
pub const ERROR_CODE: u8 = 0;
/// Code byte of a reply frame
pub const REPLY_CODE: u8 = 1;
/// Set on events generated by SendEvent
pub const SEND_EVENT_BIT: u8 = 0x80;

/// Fields shared by key, button and motion events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Keycode, button number, or motion hint
    pub detail: u8,
    pub sequence: u16,
    pub time: u32,
    pub root: Window,
    pub event: Window,
    pub child: Window,
    pub root_x: i16,
    pub root_y: i16,
    pub event_x: i16,
    pub event_y: i16,
    pub state: u16,
    pub same_screen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposeEvent {
    pub sequence: u16,
    pub window: Window,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureNotifyEvent {
    pub sequence: u16,
    pub event: Window,
    pub window: Window,
    pub above_sibling: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub override_redirect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessageEvent {
    pub format: u8,
    pub sequence: u16,
    pub window: Window,
    pub type_: Atom,
    /// The 20 data bytes read as five 32-bit words
    pub data: [u32; 5],
}

/// Error frame: the server rejected one of our requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorFrame {
    pub code: u8,
    pub sequence: u16,
    pub bad_value: u32,
    pub minor_opcode: u16,
    pub major_opcode: u8,
}

/// Reply header; `length` counts the words following the 32-byte frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub data: u8,
    pub sequence: u16,
    pub length: u32,
}

impl ReplyHeader {
    pub fn extra_len(&self) -> usize {
        self.length as usize * 4
    }
}

/// A decoded server frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum X11Event {
    KeyPress(InputEvent),
    KeyRelease(InputEvent),
    ButtonPress(InputEvent),
    ButtonRelease(InputEvent),
    MotionNotify(InputEvent),
    Expose(ExposeEvent),
    ConfigureNotify(ConfigureNotifyEvent),
    ClientMessage(ClientMessageEvent),
    Error(ErrorFrame),
    Reply(ReplyHeader),
    /// Any code this client does not select or understand
    Unknown { code: u8 },
}

impl X11Event {
    /// Decode one frame. Only the first 32 bytes are looked at.
    pub fn decode(frame: &[u8]) -> Result<X11Event, DecodeError> {
        if frame.len() < FRAME_LEN {
            return Err(DecodeError::Truncated {
                offset: 0,
                needed: FRAME_LEN,
                available: frame.len(),
            });
        }

        let code = frame[0] & !SEND_EVENT_BIT;
        let event = match code {
            ERROR_CODE => X11Event::Error(decode_error(frame)?),
            REPLY_CODE => {
                let mut r = WireReader::at(frame, 1);
                X11Event::Reply(ReplyHeader {
                    data: r.u8()?,
                    sequence: r.u16()?,
                    length: r.u32()?,
                })
            }
            2 => X11Event::KeyPress(decode_input(frame)?),
            3 => X11Event::KeyRelease(decode_input(frame)?),
            4 => X11Event::ButtonPress(decode_input(frame)?),
            5 => X11Event::ButtonRelease(decode_input(frame)?),
            6 => X11Event::MotionNotify(decode_input(frame)?),
            12 => {
                let mut r = WireReader::at(frame, 2);
                X11Event::Expose(ExposeEvent {
                    sequence: r.u16()?,
                    window: Window::new(r.u32()?),
                    x: r.u16()?,
                    y: r.u16()?,
                    width: r.u16()?,
                    height: r.u16()?,
                    count: r.u16()?,
                })
            }
            22 => {
                let mut r = WireReader::at(frame, 2);
                X11Event::ConfigureNotify(ConfigureNotifyEvent {
                    sequence: r.u16()?,
                    event: Window::new(r.u32()?),
                    window: Window::new(r.u32()?),
                    above_sibling: Window::new(r.u32()?),
                    x: r.i16()?,
                    y: r.i16()?,
                    width: r.u16()?,
                    height: r.u16()?,
                    border_width: r.u16()?,
                    override_redirect: r.u8()? != 0,
                })
            }
            33 => {
                let mut r = WireReader::at(frame, 1);
                let format = r.u8()?;
                let sequence = r.u16()?;
                let window = Window::new(r.u32()?);
                let type_ = Atom::new(r.u32()?);
                let mut data = [0u32; 5];
                for word in data.iter_mut() {
                    *word = r.u32()?;
                }
                X11Event::ClientMessage(ClientMessageEvent {
                    format,
                    sequence,
                    window,
                    type_,
                    data,
                })
            }
            _ => X11Event::Unknown { code },
        };
        Ok(event)
    }

    /// Serialize into a 32-byte frame, as a server would send it.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = WireBuf::with_capacity(FRAME_LEN);
        match self {
            X11Event::KeyPress(e) => encode_input(&mut buf, EventType::KeyPress, e),
            X11Event::KeyRelease(e) => encode_input(&mut buf, EventType::KeyRelease, e),
            X11Event::ButtonPress(e) => encode_input(&mut buf, EventType::ButtonPress, e),
            X11Event::ButtonRelease(e) => encode_input(&mut buf, EventType::ButtonRelease, e),
            X11Event::MotionNotify(e) => encode_input(&mut buf, EventType::MotionNotify, e),
            X11Event::Expose(e) => {
                buf.put_u8(EventType::Expose as u8)
                    .put_u8(0)
                    .put_u16(e.sequence)
                    .put_u32(e.window.id().get())
                    .put_u16(e.x)
                    .put_u16(e.y)
                    .put_u16(e.width)
                    .put_u16(e.height)
                    .put_u16(e.count);
            }
            X11Event::ConfigureNotify(e) => {
                buf.put_u8(EventType::ConfigureNotify as u8)
                    .put_u8(0)
                    .put_u16(e.sequence)
                    .put_u32(e.event.id().get())
                    .put_u32(e.window.id().get())
                    .put_u32(e.above_sibling.id().get())
                    .put_i16(e.x)
                    .put_i16(e.y)
                    .put_u16(e.width)
                    .put_u16(e.height)
                    .put_u16(e.border_width)
                    .put_u8(u8::from(e.override_redirect));
            }
            X11Event::ClientMessage(e) => {
                buf.put_u8(EventType::ClientMessage as u8)
                    .put_u8(e.format)
                    .put_u16(e.sequence)
                    .put_u32(e.window.id().get())
                    .put_u32(e.type_.get());
                for word in e.data {
                    buf.put_u32(word);
                }
            }
            X11Event::Error(e) => {
                buf.put_u8(ERROR_CODE)
                    .put_u8(e.code)
                    .put_u16(e.sequence)
                    .put_u32(e.bad_value)
                    .put_u16(e.minor_opcode)
                    .put_u8(e.major_opcode);
            }
            X11Event::Reply(r) => {
                buf.put_u8(REPLY_CODE)
                    .put_u8(r.data)
                    .put_u16(r.sequence)
                    .put_u32(r.length);
            }
            X11Event::Unknown { code } => {
                buf.put_u8(*code);
            }
        }

        let mut frame = [0u8; FRAME_LEN];
        let bytes = buf.as_slice();
        frame[..bytes.len()].copy_from_slice(bytes);
        frame
    }
}

fn decode_input(frame: &[u8]) -> Result<InputEvent, DecodeError> {
    let mut r = WireReader::at(frame, 1);
    Ok(InputEvent {
        detail: r.u8()?,
        sequence: r.u16()?,
        time: r.u32()?,
        root: Window::new(r.u32()?),
        event: Window::new(r.u32()?),
        child: Window::new(r.u32()?),
        root_x: r.i16()?,
        root_y: r.i16()?,
        event_x: r.i16()?,
        event_y: r.i16()?,
        state: r.u16()?,
        same_screen: r.u8()? != 0,
    })
}

fn encode_input(buf: &mut WireBuf, kind: EventType, e: &InputEvent) {
    buf.put_u8(kind as u8)
        .put_u8(e.detail)
        .put_u16(e.sequence)
        .put_u32(e.time)
        .put_u32(e.root.id().get())
        .put_u32(e.event.id().get())
        .put_u32(e.child.id().get())
        .put_i16(e.root_x)
        .put_i16(e.root_y)
        .put_i16(e.event_x)
        .put_i16(e.event_y)
        .put_u16(e.state)
        .put_u8(u8::from(e.same_screen));
}

fn decode_error(frame: &[u8]) -> Result<ErrorFrame, DecodeError> {
    let mut r = WireReader::at(frame, 1);
    Ok(ErrorFrame {
        code: r.u8()?,
        sequence: r.u16()?,
        bad_value: r.u32()?,
        minor_opcode: r.u16()?,
        major_opcode: r.u8()?,
    })
}
