//! Backend configuration
//!
//! Nothing in the backends reads the environment. The caller builds a
//! [`BackendConfig`] once, either by hand or with
//! [`BackendConfig::from_env`], and passes it in.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BackendError, BackendResult};

/// Directory holding the local X server sockets
pub const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";

/// X servers listen on this port plus the display number
pub const X11_TCP_PORT_BASE: u16 = 6000;

/// Socket name for an explicitly requested Wayland backend when
/// `WAYLAND_DISPLAY` is unset
pub const DEFAULT_WAYLAND_SOCKET: &str = "wayland-0";

pub const DEFAULT_ROUNDTRIP_TIMEOUT: Duration = Duration::from_secs(5);

/// Where an X server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayAddress {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

/// A parsed `[host]:display[.screen]` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName {
    pub host: String,
    pub display: u16,
    pub screen: u16,
}

impl DisplayName {
    pub fn parse(name: &str) -> BackendResult<Self> {
        let invalid = || BackendError::InvalidDisplayName(name.to_string());

        let (host, rest) = name.rsplit_once(':').ok_or_else(invalid)?;
        let (display, screen) = match rest.split_once('.') {
            Some((display, screen)) => (display, screen.parse().map_err(|_| invalid())?),
            None => (rest, 0),
        };
        let display = display.parse().map_err(|_| invalid())?;

        Ok(DisplayName {
            host: host.to_string(),
            display,
            screen,
        })
    }

    /// Local displays use the Unix socket, anything else TCP.
    pub fn address(&self) -> DisplayAddress {
        if self.host.is_empty() || self.host == "unix" {
            DisplayAddress::Unix(
                Path::new(X11_SOCKET_DIR).join(format!("X{}", self.display)),
            )
        } else {
            DisplayAddress::Tcp {
                host: self.host.clone(),
                port: X11_TCP_PORT_BASE.saturating_add(self.display),
            }
        }
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.host, self.display, self.screen)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Config {
    pub address: DisplayAddress,
    /// Screen to create the window on
    pub screen: u16,
}

impl X11Config {
    pub fn from_display_name(name: &DisplayName) -> Self {
        X11Config {
            address: name.address(),
            screen: name.screen,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaylandConfig {
    /// Absolute path of the compositor socket
    pub socket: PathBuf,
    /// Longest a round-trip may wait for its callback
    pub roundtrip_timeout: Duration,
}

impl WaylandConfig {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        WaylandConfig {
            socket: socket.into(),
            roundtrip_timeout: DEFAULT_ROUNDTRIP_TIMEOUT,
        }
    }
}

/// Image encodings the file backend can write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFileFormat {
    /// ASCII PPM (P3)
    Ppm,
    /// Binary PPM (P6)
    PpmBinary,
    /// 24-bit bottom-up BMP
    Bmp,
}

impl ImageFileFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ppm" => Some(ImageFileFormat::Ppm),
            "ppm_binary" | "ppm-binary" | "p6" => Some(ImageFileFormat::PpmBinary),
            "bmp" => Some(ImageFileFormat::Bmp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFileFormat::Ppm | ImageFileFormat::PpmBinary => "ppm",
            ImageFileFormat::Bmp => "bmp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    pub output_dir: PathBuf,
    pub format: ImageFileFormat,
    /// Request close after this many frames
    pub max_frames: Option<u64>,
}

impl FileConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        FileConfig {
            output_dir: output_dir.into(),
            format: ImageFileFormat::Ppm,
            max_frames: None,
        }
    }
}

/// Which display to open and how to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    X11(X11Config),
    Wayland(WaylandConfig),
    File(FileConfig),
}

impl BackendConfig {
    /// Resolve the display server from `WAYLAND_DISPLAY`, `XDG_RUNTIME_DIR`
    /// and `DISPLAY`. Wayland wins when both are set.
    pub fn from_env() -> BackendResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Same as [`from_env`](Self::from_env) with an explicit lookup.
    pub fn from_vars<F>(lookup: F) -> BackendResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(socket) = lookup("WAYLAND_DISPLAY") {
            return Ok(BackendConfig::Wayland(wayland_config(&socket, &lookup)));
        }

        if let Some(display) = lookup("DISPLAY") {
            let name = DisplayName::parse(&display)?;
            return Ok(BackendConfig::X11(X11Config::from_display_name(&name)));
        }

        Err(BackendError::MissingEnvironment("WAYLAND_DISPLAY or DISPLAY"))
    }

    pub fn x11(display: &str) -> BackendResult<Self> {
        let name = DisplayName::parse(display)?;
        Ok(BackendConfig::X11(X11Config::from_display_name(&name)))
    }

    /// Wayland endpoint from the environment even when `DISPLAY` is set.
    pub fn wayland_from_env() -> Self {
        Self::wayland_from_vars(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Wayland endpoint from `WAYLAND_DISPLAY`, or
    /// [`DEFAULT_WAYLAND_SOCKET`] in the runtime dir.
    pub fn wayland_from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let socket =
            lookup("WAYLAND_DISPLAY").unwrap_or_else(|| DEFAULT_WAYLAND_SOCKET.to_string());
        BackendConfig::Wayland(wayland_config(&socket, &lookup))
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::X11(_) => "x11",
            BackendConfig::Wayland(_) => "wayland",
            BackendConfig::File(_) => "file",
        }
    }
}

/// Relative socket names live in the runtime dir
fn wayland_config<F>(socket: &str, lookup: &F) -> WaylandConfig
where
    F: Fn(&str) -> Option<String>,
{
    let path = PathBuf::from(socket);
    if path.is_absolute() {
        WaylandConfig::new(path)
    } else {
        WaylandConfig::new(runtime_dir(lookup).join(path))
    }
}

fn runtime_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("XDG_RUNTIME_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => default_runtime_dir(),
    }
}

#[cfg(unix)]
fn default_runtime_dir() -> PathBuf {
    PathBuf::from(format!("/run/user/{}", nix::unistd::getuid()))
}

#[cfg(not(unix))]
fn default_runtime_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOptions {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowOptions {
    fn default() -> Self {
        WindowOptions {
            width: 640,
            height: 480,
            title: "framewire".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_display_name_local() {
        let name = DisplayName::parse(":1").unwrap();
        assert_eq!(name.display, 1);
        assert_eq!(name.screen, 0);
        assert_eq!(
            name.address(),
            DisplayAddress::Unix(PathBuf::from("/tmp/.X11-unix/X1"))
        );
    }

    #[test]
    fn test_display_name_with_host_and_screen() {
        let name = DisplayName::parse("remote.example:2.1").unwrap();
        assert_eq!(name.host, "remote.example");
        assert_eq!(name.screen, 1);
        assert_eq!(
            name.address(),
            DisplayAddress::Tcp {
                host: "remote.example".into(),
                port: 6002
            }
        );
    }

    #[test]
    fn test_display_name_unix_host() {
        let name = DisplayName::parse("unix:0").unwrap();
        assert!(matches!(name.address(), DisplayAddress::Unix(_)));
    }

    #[test]
    fn test_display_name_invalid() {
        for bad in ["", "0", ":", ":x", ":0.y"] {
            assert!(
                matches!(
                    DisplayName::parse(bad),
                    Err(BackendError::InvalidDisplayName(_))
                ),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_wayland_wins_over_x11() {
        let config = BackendConfig::from_vars(vars(&[
            ("WAYLAND_DISPLAY", "wayland-1"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
            ("DISPLAY", ":0"),
        ]))
        .unwrap();
        assert_eq!(
            config,
            BackendConfig::Wayland(WaylandConfig::new("/run/user/1000/wayland-1"))
        );
    }

    #[test]
    fn test_absolute_wayland_socket() {
        let config =
            BackendConfig::from_vars(vars(&[("WAYLAND_DISPLAY", "/tmp/compositor")])).unwrap();
        match config {
            BackendConfig::Wayland(w) => {
                assert_eq!(w.socket, PathBuf::from("/tmp/compositor"));
                assert_eq!(w.roundtrip_timeout, DEFAULT_ROUNDTRIP_TIMEOUT);
            }
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn test_requested_wayland_falls_back_to_default_socket() {
        let config = BackendConfig::wayland_from_vars(vars(&[
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
            ("DISPLAY", ":0"),
        ]));
        assert_eq!(
            config,
            BackendConfig::Wayland(WaylandConfig::new(
                PathBuf::from("/run/user/1000").join(DEFAULT_WAYLAND_SOCKET)
            ))
        );

        let config = BackendConfig::wayland_from_vars(vars(&[
            ("WAYLAND_DISPLAY", "wayland-2"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
        ]));
        assert_eq!(
            config,
            BackendConfig::Wayland(WaylandConfig::new("/run/user/1000/wayland-2"))
        );
    }

    #[test]
    fn test_x11_from_display() {
        let config = BackendConfig::from_vars(vars(&[("DISPLAY", ":3")])).unwrap();
        assert_eq!(config.name(), "x11");
    }

    #[test]
    fn test_nothing_set_is_fatal() {
        assert!(matches!(
            BackendConfig::from_vars(vars(&[])),
            Err(BackendError::MissingEnvironment(_))
        ));
    }

    #[test]
    fn test_image_file_format() {
        assert_eq!(ImageFileFormat::parse("bmp"), Some(ImageFileFormat::Bmp));
        assert_eq!(
            ImageFileFormat::parse("ppm_binary").map(|f| f.extension()),
            Some("ppm")
        );
        assert_eq!(ImageFileFormat::parse("png"), None);
    }
}
