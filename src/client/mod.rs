//! Wire clients
//!
//! Each client owns one transport and speaks one protocol. The backends in
//! [`crate::backend`] build windows on top of them.

#[cfg(feature = "backend-x11")]
pub mod x11;

#[cfg(feature = "backend-wayland")]
pub mod wayland;
