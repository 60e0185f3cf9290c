//! Error types shared by the transports, wire clients and backends.
//!
//! Only setup-phase failures travel through these types to the caller. Once a
//! window exists, anything the server says wrong is turned into an event
//! instead (see [`crate::backend::BackendEvent`]).

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{DecodeError, EncodeError};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Everything that can abort a backend operation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Socket or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A raw system call failed.
    #[cfg(unix)]
    #[error("system call failed: {0}")]
    Os(#[from] nix::errno::Errno),

    /// The X server answered the setup packet with something other than success.
    #[error("X server rejected connection (status {status}): {reason}")]
    SetupRefused { status: u8, reason: String },

    /// The setup reply ended before all announced fields were read.
    #[error("setup reply truncated: {0}")]
    SetupTruncated(#[source] DecodeError),

    /// A display name did not match `[host]:display[.screen]`.
    #[error("invalid display name: {0:?}")]
    InvalidDisplayName(String),

    /// No usable display server could be located from the environment.
    #[error("environment variable {0} is not set and has no default")]
    MissingEnvironment(&'static str),

    /// The resource-id space granted by the server is used up.
    #[error("resource ids exhausted (base 0x{base:08x}, mask 0x{mask:08x})")]
    ResourcesExhausted { base: u32, mask: u32 },

    /// A Wayland round-trip did not complete in time.
    #[error("round-trip not acknowledged within {0:?}")]
    RoundtripTimeout(Duration),

    /// The compositor does not advertise an interface the backend cannot work without.
    #[error("compositor does not advertise required global {0}")]
    MissingGlobal(&'static str),

    /// A single request would not fit in the protocol's length field.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The X server answered a request with an error frame.
    #[error("X11 error {code} for request {major_opcode} (sequence {sequence}, value 0x{bad_value:08x})")]
    X11Error {
        code: u8,
        sequence: u16,
        bad_value: u32,
        major_opcode: u8,
    },

    /// The peer sent a frame that cannot be a valid message.
    #[error("malformed frame: {0}")]
    Malformed(#[from] DecodeError),

    /// The server closed the connection.
    #[error("display server closed the connection")]
    Disconnected,

    /// The backend was not compiled in or does not run on this platform.
    #[error("{0} backend is not available in this build")]
    Unavailable(&'static str),
}
