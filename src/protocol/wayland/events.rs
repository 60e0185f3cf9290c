//! Events received from the compositor
//!
//! The header alone does not say which interface an object implements, so
//! decoding needs the [`ObjectKind`] the client recorded when it created the
//! id.

use super::interfaces::*;
use super::{encode_message, ObjectId};
use crate::protocol::{DecodeError, EncodeError, WireBuf, WireReader};

#[derive(Debug, Clone, PartialEq)]
pub enum WlEvent {
    /// Fatal protocol error raised against `object`
    DisplayError {
        object: ObjectId,
        code: u32,
        message: String,
    },
    /// The compositor no longer references this id
    DeleteId { id: u32 },
    Global {
        name: u32,
        interface: String,
        version: u32,
    },
    GlobalRemove { name: u32 },
    CallbackDone { data: u32 },
    ShmFormat { format: u32 },
    BufferRelease,
    Ping { serial: u32 },
    XdgSurfaceConfigure { serial: u32 },
    /// Zero width or height means the client picks
    ToplevelConfigure {
        width: i32,
        height: i32,
        states: Vec<u32>,
    },
    ToplevelClose,
    SeatCapabilities { capabilities: u32 },
    PointerEnter {
        serial: u32,
        surface: ObjectId,
        x: f64,
        y: f64,
    },
    PointerLeave { serial: u32, surface: ObjectId },
    PointerMotion { time: u32, x: f64, y: f64 },
    PointerButton {
        serial: u32,
        time: u32,
        button: u32,
        state: u32,
    },
    KeyboardKey {
        serial: u32,
        time: u32,
        key: u32,
        state: u32,
    },
    /// An event this client does not act on
    Other { kind: ObjectKind, opcode: u16 },
}

impl WlEvent {
    /// Decode the payload of an event sent by an object of `kind`.
    pub fn decode(kind: ObjectKind, opcode: u16, payload: &[u8]) -> Result<WlEvent, DecodeError> {
        let mut r = WireReader::new(payload);
        let event = match (kind, opcode) {
            (ObjectKind::Display, wl_display::ev::ERROR) => WlEvent::DisplayError {
                object: ObjectId(r.u32()?),
                code: r.u32()?,
                message: r.string()?,
            },
            (ObjectKind::Display, wl_display::ev::DELETE_ID) => WlEvent::DeleteId { id: r.u32()? },
            (ObjectKind::Registry, wl_registry::ev::GLOBAL) => WlEvent::Global {
                name: r.u32()?,
                interface: r.string()?,
                version: r.u32()?,
            },
            (ObjectKind::Registry, wl_registry::ev::GLOBAL_REMOVE) => {
                WlEvent::GlobalRemove { name: r.u32()? }
            }
            (ObjectKind::Callback, wl_callback::ev::DONE) => WlEvent::CallbackDone { data: r.u32()? },
            (ObjectKind::Shm, wl_shm::ev::FORMAT) => WlEvent::ShmFormat { format: r.u32()? },
            (ObjectKind::Buffer, wl_buffer::ev::RELEASE) => WlEvent::BufferRelease,
            (ObjectKind::XdgWmBase, xdg_wm_base::ev::PING) => WlEvent::Ping { serial: r.u32()? },
            (ObjectKind::XdgSurface, xdg_surface::ev::CONFIGURE) => {
                WlEvent::XdgSurfaceConfigure { serial: r.u32()? }
            }
            (ObjectKind::XdgToplevel, xdg_toplevel::ev::CONFIGURE) => {
                let width = r.i32()?;
                let height = r.i32()?;
                let states = r
                    .array()?
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                WlEvent::ToplevelConfigure {
                    width,
                    height,
                    states,
                }
            }
            (ObjectKind::XdgToplevel, xdg_toplevel::ev::CLOSE) => WlEvent::ToplevelClose,
            (ObjectKind::Seat, wl_seat::ev::CAPABILITIES) => WlEvent::SeatCapabilities {
                capabilities: r.u32()?,
            },
            (ObjectKind::Pointer, wl_pointer::ev::ENTER) => WlEvent::PointerEnter {
                serial: r.u32()?,
                surface: ObjectId(r.u32()?),
                x: r.fixed()?,
                y: r.fixed()?,
            },
            (ObjectKind::Pointer, wl_pointer::ev::LEAVE) => WlEvent::PointerLeave {
                serial: r.u32()?,
                surface: ObjectId(r.u32()?),
            },
            (ObjectKind::Pointer, wl_pointer::ev::MOTION) => WlEvent::PointerMotion {
                time: r.u32()?,
                x: r.fixed()?,
                y: r.fixed()?,
            },
            (ObjectKind::Pointer, wl_pointer::ev::BUTTON) => WlEvent::PointerButton {
                serial: r.u32()?,
                time: r.u32()?,
                button: r.u32()?,
                state: r.u32()?,
            },
            (ObjectKind::Keyboard, wl_keyboard::ev::KEY) => WlEvent::KeyboardKey {
                serial: r.u32()?,
                time: r.u32()?,
                key: r.u32()?,
                state: r.u32()?,
            },
            (kind, opcode) => WlEvent::Other { kind, opcode },
        };
        Ok(event)
    }

    /// Opcode of this event within its interface
    pub fn opcode(&self) -> u16 {
        match self {
            WlEvent::DisplayError { .. } => wl_display::ev::ERROR,
            WlEvent::DeleteId { .. } => wl_display::ev::DELETE_ID,
            WlEvent::Global { .. } => wl_registry::ev::GLOBAL,
            WlEvent::GlobalRemove { .. } => wl_registry::ev::GLOBAL_REMOVE,
            WlEvent::CallbackDone { .. } => wl_callback::ev::DONE,
            WlEvent::ShmFormat { .. } => wl_shm::ev::FORMAT,
            WlEvent::BufferRelease => wl_buffer::ev::RELEASE,
            WlEvent::Ping { .. } => xdg_wm_base::ev::PING,
            WlEvent::XdgSurfaceConfigure { .. } => xdg_surface::ev::CONFIGURE,
            WlEvent::ToplevelConfigure { .. } => xdg_toplevel::ev::CONFIGURE,
            WlEvent::ToplevelClose => xdg_toplevel::ev::CLOSE,
            WlEvent::SeatCapabilities { .. } => wl_seat::ev::CAPABILITIES,
            WlEvent::PointerEnter { .. } => wl_pointer::ev::ENTER,
            WlEvent::PointerLeave { .. } => wl_pointer::ev::LEAVE,
            WlEvent::PointerMotion { .. } => wl_pointer::ev::MOTION,
            WlEvent::PointerButton { .. } => wl_pointer::ev::BUTTON,
            WlEvent::KeyboardKey { .. } => wl_keyboard::ev::KEY,
            WlEvent::Other { opcode, .. } => *opcode,
        }
    }

    /// Serialize as the compositor would send it from `sender`.
    pub fn encode(&self, sender: ObjectId) -> Result<Vec<u8>, EncodeError> {
        let mut args = WireBuf::new();
        match self {
            WlEvent::DisplayError {
                object,
                code,
                message,
            } => {
                args.put_u32(object.get()).put_u32(*code).put_string(message);
            }
            WlEvent::Global {
                name,
                interface,
                version,
            } => {
                args.put_u32(*name).put_string(interface).put_u32(*version);
            }
            WlEvent::DeleteId { id: value }
            | WlEvent::GlobalRemove { name: value }
            | WlEvent::CallbackDone { data: value }
            | WlEvent::ShmFormat { format: value }
            | WlEvent::Ping { serial: value }
            | WlEvent::XdgSurfaceConfigure { serial: value }
            | WlEvent::SeatCapabilities {
                capabilities: value,
            } => {
                args.put_u32(*value);
            }
            WlEvent::ToplevelConfigure {
                width,
                height,
                states,
            } => {
                args.put_i32(*width)
                    .put_i32(*height)
                    .put_u32(states.len() as u32 * 4);
                for state in states {
                    args.put_u32(*state);
                }
            }
            WlEvent::PointerEnter {
                serial,
                surface,
                x,
                y,
            } => {
                args.put_u32(*serial)
                    .put_u32(surface.get())
                    .put_fixed(*x)
                    .put_fixed(*y);
            }
            WlEvent::PointerLeave { serial, surface } => {
                args.put_u32(*serial).put_u32(surface.get());
            }
            WlEvent::PointerMotion { time, x, y } => {
                args.put_u32(*time).put_fixed(*x).put_fixed(*y);
            }
            WlEvent::PointerButton {
                serial,
                time,
                button,
                state,
            }
            | WlEvent::KeyboardKey {
                serial,
                time,
                key: button,
                state,
            } => {
                args.put_u32(*serial)
                    .put_u32(*time)
                    .put_u32(*button)
                    .put_u32(*state);
            }
            WlEvent::BufferRelease | WlEvent::ToplevelClose | WlEvent::Other { .. } => {}
        }
        encode_message(sender, self.opcode(), args.as_slice())
    }
}
