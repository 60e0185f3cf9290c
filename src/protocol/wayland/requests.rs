//! Requests sent to the compositor

use super::interfaces::*;
use super::{encode_message, ObjectId};
use crate::protocol::{EncodeError, WireBuf};

/// A request together with its arguments. The target object is supplied at
/// encode time.
#[derive(Debug, Clone, PartialEq)]
pub enum WlRequest<'a> {
    Sync { callback: ObjectId },
    GetRegistry { registry: ObjectId },
    Bind {
        name: u32,
        interface: &'a str,
        version: u32,
        id: ObjectId,
    },
    CreateSurface { id: ObjectId },
    SurfaceDestroy,
    Attach { buffer: ObjectId, x: i32, y: i32 },
    Damage { x: i32, y: i32, width: i32, height: i32 },
    Commit,
    /// The pool's file descriptor travels out of band with this message
    CreatePool { id: ObjectId, size: i32 },
    CreateBuffer {
        id: ObjectId,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
        format: u32,
    },
    PoolDestroy,
    BufferDestroy,
    GetXdgSurface { id: ObjectId, surface: ObjectId },
    Pong { serial: u32 },
    XdgSurfaceDestroy,
    GetToplevel { id: ObjectId },
    AckConfigure { serial: u32 },
    ToplevelDestroy,
    SetTitle { title: &'a str },
    GetPointer { id: ObjectId },
    GetKeyboard { id: ObjectId },
}

impl WlRequest<'_> {
    pub fn opcode(&self) -> u16 {
        match self {
            WlRequest::Sync { .. } => wl_display::req::SYNC,
            WlRequest::GetRegistry { .. } => wl_display::req::GET_REGISTRY,
            WlRequest::Bind { .. } => wl_registry::req::BIND,
            WlRequest::CreateSurface { .. } => wl_compositor::req::CREATE_SURFACE,
            WlRequest::SurfaceDestroy => wl_surface::req::DESTROY,
            WlRequest::Attach { .. } => wl_surface::req::ATTACH,
            WlRequest::Damage { .. } => wl_surface::req::DAMAGE,
            WlRequest::Commit => wl_surface::req::COMMIT,
            WlRequest::CreatePool { .. } => wl_shm::req::CREATE_POOL,
            WlRequest::CreateBuffer { .. } => wl_shm_pool::req::CREATE_BUFFER,
            WlRequest::PoolDestroy => wl_shm_pool::req::DESTROY,
            WlRequest::BufferDestroy => wl_buffer::req::DESTROY,
            WlRequest::GetXdgSurface { .. } => xdg_wm_base::req::GET_XDG_SURFACE,
            WlRequest::Pong { .. } => xdg_wm_base::req::PONG,
            WlRequest::XdgSurfaceDestroy => xdg_surface::req::DESTROY,
            WlRequest::GetToplevel { .. } => xdg_surface::req::GET_TOPLEVEL,
            WlRequest::AckConfigure { .. } => xdg_surface::req::ACK_CONFIGURE,
            WlRequest::ToplevelDestroy => xdg_toplevel::req::DESTROY,
            WlRequest::SetTitle { .. } => xdg_toplevel::req::SET_TITLE,
            WlRequest::GetPointer { .. } => wl_seat::req::GET_POINTER,
            WlRequest::GetKeyboard { .. } => wl_seat::req::GET_KEYBOARD,
        }
    }

    fn write_args(&self, args: &mut WireBuf) {
        match self {
            WlRequest::Sync { callback: id }
            | WlRequest::GetRegistry { registry: id }
            | WlRequest::CreateSurface { id }
            | WlRequest::GetToplevel { id }
            | WlRequest::GetPointer { id }
            | WlRequest::GetKeyboard { id } => {
                args.put_u32(id.get());
            }
            WlRequest::Bind {
                name,
                interface,
                version,
                id,
            } => {
                // Untyped new_id: interface and version precede the id
                args.put_u32(*name)
                    .put_string(interface)
                    .put_u32(*version)
                    .put_u32(id.get());
            }
            WlRequest::Attach { buffer, x, y } => {
                args.put_u32(buffer.get()).put_i32(*x).put_i32(*y);
            }
            WlRequest::Damage {
                x,
                y,
                width,
                height,
            } => {
                args.put_i32(*x).put_i32(*y).put_i32(*width).put_i32(*height);
            }
            WlRequest::CreatePool { id, size } => {
                args.put_u32(id.get()).put_i32(*size);
            }
            WlRequest::CreateBuffer {
                id,
                offset,
                width,
                height,
                stride,
                format,
            } => {
                args.put_u32(id.get())
                    .put_i32(*offset)
                    .put_i32(*width)
                    .put_i32(*height)
                    .put_i32(*stride)
                    .put_u32(*format);
            }
            WlRequest::GetXdgSurface { id, surface } => {
                args.put_u32(id.get()).put_u32(surface.get());
            }
            WlRequest::Pong { serial } | WlRequest::AckConfigure { serial } => {
                args.put_u32(*serial);
            }
            WlRequest::SetTitle { title } => {
                args.put_string(title);
            }
            WlRequest::SurfaceDestroy
            | WlRequest::Commit
            | WlRequest::PoolDestroy
            | WlRequest::BufferDestroy
            | WlRequest::XdgSurfaceDestroy
            | WlRequest::ToplevelDestroy => {}
        }
    }

    /// Serialize as a message addressed to `target`.
    pub fn encode(&self, target: ObjectId) -> Result<Vec<u8>, EncodeError> {
        let mut args = WireBuf::new();
        self.write_args(&mut args);
        encode_message(target, self.opcode(), args.as_slice())
    }
}
