/// Framewire - software-rendered frames on X11 and Wayland
///
/// This library speaks the X11 and Wayland wire protocols directly over a
/// socket: handshake, resource ids, request encoding, event decoding and
/// shared-memory buffers. A [`Backend`] hides which protocol is in use behind
/// present, poll and close.

pub mod backend;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod protocol;

#[cfg(unix)]
pub mod client;
#[cfg(unix)]
pub mod connection;
#[cfg(unix)]
pub mod resources;
#[cfg(unix)]
pub mod shm;

pub use backend::{available_backends, open_backend, Backend, BackendEvent, BackendState};
pub use config::{BackendConfig, FileConfig, ImageFileFormat, WaylandConfig, WindowOptions, X11Config};
pub use error::{BackendError, BackendResult};
pub use framebuffer::{Color, Framebuffer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
