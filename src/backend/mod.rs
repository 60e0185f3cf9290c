/// Backend implementations
///
/// This module contains the backend trait and implementations for the
/// display systems a frame can be presented on (X11, Wayland, image files).

mod r#trait;
pub use r#trait::*;

// Backend implementations (feature-gated)

#[cfg(all(feature = "backend-x11", target_family = "unix"))]
pub mod x11;

#[cfg(all(feature = "backend-wayland", target_os = "linux"))]
pub mod wayland;

pub mod file;

use crate::config::{BackendConfig, WindowOptions};
use crate::error::{BackendError, BackendResult};

/// Get available backend names (features enabled + platform compatible)
#[allow(unused_mut)] // mut needed when features are enabled
pub fn available_backends() -> Vec<&'static str> {
    let mut backends = Vec::new();

    // X11 backend is available on Unix systems when feature is enabled
    #[cfg(all(feature = "backend-x11", target_family = "unix"))]
    backends.push("x11");

    // Wayland backend is available on Linux when feature is enabled
    #[cfg(all(feature = "backend-wayland", target_os = "linux"))]
    backends.push("wayland");

    // Writing image files works everywhere
    backends.push("file");

    backends
}

/// Open the backend `config` names and create its window.
pub fn open_backend(
    config: &BackendConfig,
    options: &WindowOptions,
) -> BackendResult<Box<dyn Backend>> {
    log::info!("Opening {} backend", config.name());
    match config {
        #[cfg(all(feature = "backend-x11", target_family = "unix"))]
        BackendConfig::X11(x11) => Ok(Box::new(x11::X11Backend::connect(x11, options)?)),
        #[cfg(all(feature = "backend-wayland", target_os = "linux"))]
        BackendConfig::Wayland(wayland) => Ok(Box::new(wayland::WaylandBackend::connect(
            wayland, options,
        )?)),
        BackendConfig::File(file) => Ok(Box::new(file::FileBackend::new(file.clone(), options)?)),
        #[allow(unreachable_patterns)]
        other => Err(BackendError::Unavailable(other.name())),
    }
}
