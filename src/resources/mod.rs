//! Resource tracking for one display connection
//!
//! Id allocation for both protocols, the Wayland object table, the registry's
//! global table and the X11 atom cache. Nothing in here does I/O; the wire
//! clients own one of each and consult them while encoding and dispatching.

use std::collections::HashMap;

use crate::error::{BackendError, BackendResult};
use crate::protocol::wayland::{ObjectId, ObjectKind};
use crate::protocol::x11::Atom;

/// Hands out X11 resource ids from the range granted at setup.
///
/// Every id is `base | counter` with the counter confined to `mask`, so ids
/// never leave the client's range and are never handed out twice.
#[derive(Debug, Clone)]
pub struct X11IdAllocator {
    base: u32,
    mask: u32,
    counter: u32,
}

impl X11IdAllocator {
    pub fn new(base: u32, mask: u32) -> Self {
        X11IdAllocator {
            base,
            mask,
            counter: 0,
        }
    }

    /// Next unused id, or [`BackendError::ResourcesExhausted`] once the
    /// counter no longer fits the mask.
    pub fn allocate(&mut self) -> BackendResult<u32> {
        if self.counter & !self.mask != 0 {
            return Err(BackendError::ResourcesExhausted {
                base: self.base,
                mask: self.mask,
            });
        }
        let id = self.base | self.counter;
        self.counter += 1;
        Ok(id)
    }
}

/// Hands out Wayland client object ids. Id 1 is the display.
#[derive(Debug, Clone)]
pub struct WaylandIdAllocator {
    next: u32,
}

/// Client-side ids live below this; the compositor allocates the rest
const WAYLAND_SERVER_ID_START: u32 = 0xff00_0000;

impl Default for WaylandIdAllocator {
    fn default() -> Self {
        WaylandIdAllocator { next: 2 }
    }
}

impl WaylandIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are never reused, even after `delete_id`.
    pub fn allocate(&mut self) -> BackendResult<ObjectId> {
        if self.next >= WAYLAND_SERVER_ID_START {
            return Err(BackendError::ResourcesExhausted {
                base: 2,
                mask: WAYLAND_SERVER_ID_START - 1,
            });
        }
        let id = ObjectId(self.next);
        self.next += 1;
        Ok(id)
    }
}

/// Live Wayland objects and what interface each one implements
#[derive(Debug, Clone)]
pub struct ObjectTable {
    objects: HashMap<ObjectId, ObjectKind>,
}

impl Default for ObjectTable {
    fn default() -> Self {
        let mut objects = HashMap::new();
        objects.insert(ObjectId::DISPLAY, ObjectKind::Display);
        ObjectTable { objects }
    }
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ObjectId, kind: ObjectKind) {
        self.objects.insert(id, kind);
    }

    pub fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.objects.get(&id).copied()
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<ObjectKind> {
        self.objects.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// A global advertised by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalEntry {
    pub name: u32,
    pub version: u32,
}

/// Interface name to the global that provides it
#[derive(Debug, Clone, Default)]
pub struct GlobalTable {
    globals: HashMap<String, GlobalEntry>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advertisement. A later advertisement for the same
    /// interface replaces the earlier one.
    pub fn announce(&mut self, interface: &str, name: u32, version: u32) {
        self.globals
            .insert(interface.to_string(), GlobalEntry { name, version });
    }

    /// Forget the global with this numeric name
    pub fn remove(&mut self, name: u32) -> Option<String> {
        let interface = self
            .globals
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(interface, _)| interface.clone())?;
        self.globals.remove(&interface);
        Some(interface)
    }

    pub fn get(&self, interface: &str) -> Option<GlobalEntry> {
        self.globals.get(interface).copied()
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }
}

/// Interned X11 atoms. Each name is asked of the server at most once.
#[derive(Debug, Clone, Default)]
pub struct AtomCache {
    atoms: HashMap<String, Atom>,
}

impl AtomCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Atom> {
        self.atoms.get(name).copied()
    }

    /// Record a server answer. An existing entry is kept.
    pub fn insert(&mut self, name: &str, atom: Atom) -> Atom {
        *self.atoms.entry(name.to_string()).or_insert(atom)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
