//! Core X11 protocol types
//!
//! Only the handful of ids and enumerations a presenting client needs. They
//! stay close to the wire so requests can be encoded without translation.

use std::fmt;

/// X11 resource ID - used for windows, graphics contexts, etc.
/// In X11, all objects are identified by 29-bit IDs.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XID(pub u32);

impl XID {
    pub const NONE: XID = XID(0);

    pub fn new(id: u32) -> Self {
        XID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for XID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Window ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window(pub XID);

impl Window {
    pub const NONE: Window = Window(XID::NONE);

    pub fn new(id: u32) -> Self {
        Window(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Graphics Context ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GContext(pub XID);

impl GContext {
    pub fn new(id: u32) -> Self {
        GContext(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Atom - interned string identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(pub u32);

impl Atom {
    pub const NONE: Atom = Atom(0);
    pub const ATOM: Atom = Atom(4);
    pub const STRING: Atom = Atom(31);
    pub const WM_NAME: Atom = Atom(39);

    pub fn new(id: u32) -> Self {
        Atom(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Visual ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualID(pub u32);

impl VisualID {
    pub fn new(id: u32) -> Self {
        VisualID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Window class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    CopyFromParent = 0,
    InputOutput = 1,
    InputOnly = 2,
}

/// How ChangeProperty combines new data with the old value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    Replace = 0,
    Prepend = 1,
    Append = 2,
}

/// Image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bitmap = 0,
    XYPixmap = 1,
    ZPixmap = 2,
}

/// Event masks
pub mod event_mask {
    pub const NO_EVENT: u32 = 0;
    pub const KEY_PRESS: u32 = 1 << 0;
    pub const KEY_RELEASE: u32 = 1 << 1;
    pub const BUTTON_PRESS: u32 = 1 << 2;
    pub const BUTTON_RELEASE: u32 = 1 << 3;
    pub const POINTER_MOTION: u32 = 1 << 6;
    pub const EXPOSURE: u32 = 1 << 15;
    pub const STRUCTURE_NOTIFY: u32 = 1 << 17;
}

/// CreateWindow value-mask bits
pub mod window_attr {
    pub const BACK_PIXEL: u32 = 0x0002;
    pub const EVENT_MASK: u32 = 0x0800;
}

/// CreateGC value-mask bits
pub mod gc_attr {
    pub const FOREGROUND: u32 = 0x0004;
    pub const BACKGROUND: u32 = 0x0008;
}
