//! X11 core protocol subset
//!
//! Setup handshake, the requests a presenting client issues, and the 32-byte
//! frames the server sends back.

pub mod events;
pub mod requests;
pub mod setup;
pub mod types;

pub use events::*;
pub use requests::*;
pub use setup::*;
pub use types::*;

/// X11 protocol version spoken in the setup packet
pub const PROTOCOL_MAJOR_VERSION: u16 = 11;
pub const PROTOCOL_MINOR_VERSION: u16 = 0;

/// Every event, error and reply header is this long
pub const FRAME_LEN: usize = 32;
