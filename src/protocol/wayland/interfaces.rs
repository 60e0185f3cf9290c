//! Interfaces this client speaks, and their opcode tables
//!
//! Requests and events have separate opcode spaces per interface.

/// What an object id refers to. Incoming events are routed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Display,
    Registry,
    Callback,
    Compositor,
    Surface,
    Shm,
    ShmPool,
    Buffer,
    XdgWmBase,
    XdgSurface,
    XdgToplevel,
    Seat,
    Pointer,
    Keyboard,
}

impl ObjectKind {
    /// Interface name as advertised by the registry
    pub fn interface(&self) -> &'static str {
        match self {
            ObjectKind::Display => "wl_display",
            ObjectKind::Registry => "wl_registry",
            ObjectKind::Callback => "wl_callback",
            ObjectKind::Compositor => "wl_compositor",
            ObjectKind::Surface => "wl_surface",
            ObjectKind::Shm => "wl_shm",
            ObjectKind::ShmPool => "wl_shm_pool",
            ObjectKind::Buffer => "wl_buffer",
            ObjectKind::XdgWmBase => "xdg_wm_base",
            ObjectKind::XdgSurface => "xdg_surface",
            ObjectKind::XdgToplevel => "xdg_toplevel",
            ObjectKind::Seat => "wl_seat",
            ObjectKind::Pointer => "wl_pointer",
            ObjectKind::Keyboard => "wl_keyboard",
        }
    }

    pub fn from_interface(name: &str) -> Option<ObjectKind> {
        Some(match name {
            "wl_display" => ObjectKind::Display,
            "wl_registry" => ObjectKind::Registry,
            "wl_callback" => ObjectKind::Callback,
            "wl_compositor" => ObjectKind::Compositor,
            "wl_surface" => ObjectKind::Surface,
            "wl_shm" => ObjectKind::Shm,
            "wl_shm_pool" => ObjectKind::ShmPool,
            "wl_buffer" => ObjectKind::Buffer,
            "xdg_wm_base" => ObjectKind::XdgWmBase,
            "xdg_surface" => ObjectKind::XdgSurface,
            "xdg_toplevel" => ObjectKind::XdgToplevel,
            "wl_seat" => ObjectKind::Seat,
            "wl_pointer" => ObjectKind::Pointer,
            "wl_keyboard" => ObjectKind::Keyboard,
            _ => return None,
        })
    }
}

/// Highest version of each bound global this client understands
pub mod max_version {
    pub const COMPOSITOR: u32 = 4;
    pub const SHM: u32 = 1;
    pub const XDG_WM_BASE: u32 = 2;
    pub const SEAT: u32 = 1;
}

pub mod wl_display {
    pub mod req {
        pub const SYNC: u16 = 0;
        pub const GET_REGISTRY: u16 = 1;
    }
    pub mod ev {
        pub const ERROR: u16 = 0;
        pub const DELETE_ID: u16 = 1;
    }
}

pub mod wl_registry {
    pub mod req {
        pub const BIND: u16 = 0;
    }
    pub mod ev {
        pub const GLOBAL: u16 = 0;
        pub const GLOBAL_REMOVE: u16 = 1;
    }
}

pub mod wl_callback {
    pub mod ev {
        pub const DONE: u16 = 0;
    }
}

pub mod wl_compositor {
    pub mod req {
        pub const CREATE_SURFACE: u16 = 0;
    }
}

pub mod wl_surface {
    pub mod req {
        pub const DESTROY: u16 = 0;
        pub const ATTACH: u16 = 1;
        pub const DAMAGE: u16 = 2;
        pub const COMMIT: u16 = 6;
    }
}

pub mod wl_shm {
    pub mod req {
        pub const CREATE_POOL: u16 = 0;
    }
    pub mod ev {
        pub const FORMAT: u16 = 0;
    }
    pub mod format {
        pub const ARGB8888: u32 = 0;
        pub const XRGB8888: u32 = 1;
    }
}

pub mod wl_shm_pool {
    pub mod req {
        pub const CREATE_BUFFER: u16 = 0;
        pub const DESTROY: u16 = 1;
    }
}

pub mod wl_buffer {
    pub mod req {
        pub const DESTROY: u16 = 0;
    }
    pub mod ev {
        pub const RELEASE: u16 = 0;
    }
}

pub mod xdg_wm_base {
    pub mod req {
        pub const GET_XDG_SURFACE: u16 = 2;
        pub const PONG: u16 = 3;
    }
    pub mod ev {
        pub const PING: u16 = 0;
    }
}

pub mod xdg_surface {
    pub mod req {
        pub const DESTROY: u16 = 0;
        pub const GET_TOPLEVEL: u16 = 1;
        pub const ACK_CONFIGURE: u16 = 4;
    }
    pub mod ev {
        pub const CONFIGURE: u16 = 0;
    }
}

pub mod xdg_toplevel {
    pub mod req {
        pub const DESTROY: u16 = 0;
        pub const SET_TITLE: u16 = 2;
    }
    pub mod ev {
        pub const CONFIGURE: u16 = 0;
        pub const CLOSE: u16 = 1;
    }
}

pub mod wl_seat {
    pub mod req {
        pub const GET_POINTER: u16 = 0;
        pub const GET_KEYBOARD: u16 = 1;
    }
    pub mod ev {
        pub const CAPABILITIES: u16 = 0;
    }
    pub mod capability {
        pub const POINTER: u32 = 1;
        pub const KEYBOARD: u32 = 2;
    }
}

pub mod wl_pointer {
    pub mod ev {
        pub const ENTER: u16 = 0;
        pub const LEAVE: u16 = 1;
        pub const MOTION: u16 = 2;
        pub const BUTTON: u16 = 3;
    }
    /// Linux evdev button codes
    pub mod button {
        pub const LEFT: u32 = 0x110;
        pub const RIGHT: u32 = 0x111;
        pub const MIDDLE: u32 = 0x112;
    }
    pub const BUTTON_PRESSED: u32 = 1;
}

pub mod wl_keyboard {
    pub mod ev {
        pub const KEY: u16 = 3;
    }
    pub const KEY_PRESSED: u32 = 1;
    /// evdev scancodes sit this far below X11 keycodes
    pub const EVDEV_OFFSET: u32 = 8;
}
