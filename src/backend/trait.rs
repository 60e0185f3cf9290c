//! Backend trait definition
//!
//! This module defines the trait that all display backends implement, and
//! the protocol-neutral events they report.

use std::fmt;

use crate::error::BackendResult;
use crate::framebuffer::Framebuffer;

/// Backend events
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Key press, X11-compatible keycode
    KeyPress { key: u32 },
    /// Key release
    KeyRelease { key: u32 },
    /// Button press at window coordinates. 1 left, 2 middle, 3 right.
    MousePress { x: i32, y: i32, button: u8 },
    /// Button release
    MouseRelease { x: i32, y: i32, button: u8 },
    /// Pointer moved
    MouseMove { x: i32, y: i32 },
    /// Window size changed
    Resize { width: u32, height: u32 },
    /// Window contents need redrawing
    Expose,
    /// User or compositor asked the window to close
    Close,
    /// The server reported an error for one of our requests
    ProtocolError { code: u32, message: String },
    /// An event this crate does not interpret
    Unknown { code: u32 },
}

/// Where a backend is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Connecting,
    HandshakeDone,
    /// Required globals are bound (Wayland only)
    GlobalsBound,
    /// Window exists and is mapped
    Ready,
    Closed,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendState::Connecting => "connecting",
            BackendState::HandshakeDone => "handshake done",
            BackendState::GlobalsBound => "globals bound",
            BackendState::Ready => "ready",
            BackendState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Should-close flag. Once set it stays set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseFlag(bool);

impl CloseFlag {
    pub fn set(&mut self) {
        self.0 = true;
    }

    pub fn get(&self) -> bool {
        self.0
    }
}

/// The main backend trait
///
/// A backend owns one window. It is driven from a single thread by the
/// caller's run loop: present a frame, poll events, check whether to close.
/// After [`close`](Backend::close) every method is a no-op.
pub trait Backend {
    /// Short name, e.g. "x11"
    fn name(&self) -> &'static str;

    fn state(&self) -> BackendState;

    /// Current window size in pixels
    fn size(&self) -> (u32, u32);

    /// Show a frame
    fn present(&mut self, frame: &Framebuffer) -> BackendResult<()>;

    /// Events received since the last call. Never blocks.
    fn poll_events(&mut self) -> BackendResult<Vec<BackendEvent>>;

    fn should_close(&self) -> bool;

    /// Destroy the window and disconnect. Idempotent.
    fn close(&mut self) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_flag_is_monotonic() {
        let mut flag = CloseFlag::default();
        assert!(!flag.get());
        flag.set();
        flag.set();
        assert!(flag.get());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BackendState::GlobalsBound.to_string(), "globals bound");
    }
}
