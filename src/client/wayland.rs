//! Wayland wire client
//!
//! One connection to a compositor: object ids, the registry's globals, event
//! routing by object kind, and the sync-based round-trip.

use std::collections::{HashSet, VecDeque};
use std::os::fd::BorrowedFd;
use std::time::{Duration, Instant};

use crate::config::WaylandConfig;
use crate::connection::Transport;
use crate::error::{BackendError, BackendResult};
use crate::protocol::wayland::*;
use crate::resources::{GlobalTable, ObjectTable, WaylandIdAllocator};

/// Longest single wait between dispatch passes of a round-trip
const ROUNDTRIP_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct WaylandConnection {
    transport: Transport,
    ids: WaylandIdAllocator,
    objects: ObjectTable,
    globals: GlobalTable,
    registry: ObjectId,
    /// Callbacks whose `done` event has been decoded
    done: HashSet<ObjectId>,
    /// Events left for the owner of the connection
    events: VecDeque<(ObjectId, WlEvent)>,
    roundtrip_timeout: Duration,
}

impl WaylandConnection {
    /// Connect to the compositor socket and collect its globals.
    pub fn connect(config: &WaylandConfig) -> BackendResult<Self> {
        let transport = Transport::unix(&config.socket)?;
        Self::with_transport(transport, config.roundtrip_timeout)
    }

    /// Create the registry over an open transport and round-trip once so
    /// every global has been announced before anything is bound.
    pub fn with_transport(transport: Transport, roundtrip_timeout: Duration) -> BackendResult<Self> {
        let mut conn = WaylandConnection {
            transport,
            ids: WaylandIdAllocator::new(),
            objects: ObjectTable::new(),
            globals: GlobalTable::new(),
            registry: ObjectId::NULL,
            done: HashSet::new(),
            events: VecDeque::new(),
            roundtrip_timeout,
        };

        let registry = conn.new_object(ObjectKind::Registry)?;
        conn.send(ObjectId::DISPLAY, &WlRequest::GetRegistry { registry })?;
        conn.registry = registry;
        conn.roundtrip()?;

        log::debug!("Compositor advertised {} globals", conn.globals.len());
        Ok(conn)
    }

    pub fn globals(&self) -> &GlobalTable {
        &self.globals
    }

    pub fn registry(&self) -> ObjectId {
        self.registry
    }

    /// Allocate an id and record what it will implement.
    pub fn new_object(&mut self, kind: ObjectKind) -> BackendResult<ObjectId> {
        let id = self.ids.allocate()?;
        self.objects.insert(id, kind);
        Ok(id)
    }

    pub fn object_kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.objects.kind(id)
    }

    /// Bind a global the client cannot work without.
    pub fn bind(&mut self, kind: ObjectKind, max_version: u32) -> BackendResult<ObjectId> {
        self.bind_optional(kind, max_version)?
            .ok_or(BackendError::MissingGlobal(kind.interface()))
    }

    /// Bind a global if the compositor advertises it.
    pub fn bind_optional(
        &mut self,
        kind: ObjectKind,
        max_version: u32,
    ) -> BackendResult<Option<ObjectId>> {
        let interface = kind.interface();
        let Some(global) = self.globals.get(interface) else {
            return Ok(None);
        };
        let version = global.version.min(max_version);
        let id = self.new_object(kind)?;
        self.send(
            self.registry,
            &WlRequest::Bind {
                name: global.name,
                interface,
                version,
                id,
            },
        )?;
        log::debug!("Bound {} v{} as {}", interface, version, id);
        Ok(Some(id))
    }

    /// Queue a request for `target`.
    pub fn send(&mut self, target: ObjectId, request: &WlRequest<'_>) -> BackendResult<()> {
        let bytes = request.encode(target)?;
        log::trace!("-> {}.{} ({} bytes)", target, request.opcode(), bytes.len());
        self.transport.queue(&bytes);
        Ok(())
    }

    /// Send a request with a file descriptor attached.
    pub fn send_with_fd(
        &mut self,
        target: ObjectId,
        request: &WlRequest<'_>,
        fd: BorrowedFd<'_>,
    ) -> BackendResult<()> {
        let bytes = request.encode(target)?;
        log::trace!("-> {}.{} with fd ({} bytes)", target, request.opcode(), bytes.len());
        self.transport.send_with_fd(&bytes, fd)
    }

    pub fn flush(&mut self) -> BackendResult<()> {
        self.transport.flush()
    }

    /// Issue a `sync` and return the callback id.
    pub fn sync(&mut self) -> BackendResult<ObjectId> {
        let callback = self.new_object(ObjectKind::Callback)?;
        self.send(ObjectId::DISPLAY, &WlRequest::Sync { callback })?;
        Ok(callback)
    }

    /// Whether `callback` has received its `done` event
    pub fn is_done(&self, callback: ObjectId) -> bool {
        self.done.contains(&callback)
    }

    /// Sync and dispatch until the compositor has answered everything sent
    /// so far, or the configured timeout passes.
    pub fn roundtrip(&mut self) -> BackendResult<()> {
        let callback = self.sync()?;
        self.flush()?;

        let deadline = Instant::now() + self.roundtrip_timeout;
        loop {
            self.dispatch_pending()?;
            if self.done.remove(&callback) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                log::error!("Round-trip timed out after {:?}", self.roundtrip_timeout);
                return Err(BackendError::RoundtripTimeout(self.roundtrip_timeout));
            }
            self.transport
                .wait_readable(ROUNDTRIP_POLL_INTERVAL.min(deadline - now))?;
        }
    }

    /// Read and route every message already waiting on the socket. Never
    /// blocks for more data than a started message still owes.
    pub fn dispatch_pending(&mut self) -> BackendResult<usize> {
        let mut count = 0;
        while self.transport.readable()? {
            self.dispatch_one()?;
            count += 1;
        }
        Ok(count)
    }

    fn dispatch_one(&mut self) -> BackendResult<()> {
        let mut raw = [0u8; HEADER_LEN];
        self.transport.read_exact(&mut raw)?;
        let header = MessageHeader::parse(&raw)?;
        let mut payload = vec![0u8; header.payload_len()];
        self.transport.read_exact(&mut payload)?;

        let Some(kind) = self.objects.kind(header.object) else {
            log::debug!(
                "Event {} for unknown object {}, ignoring",
                header.opcode,
                header.object
            );
            return Ok(());
        };

        let event = match WlEvent::decode(kind, header.opcode, &payload) {
            Ok(event) => event,
            Err(e) => {
                log::warn!(
                    "Malformed {}.{} event: {}",
                    kind.interface(),
                    header.opcode,
                    e
                );
                WlEvent::Other {
                    kind,
                    opcode: header.opcode,
                }
            }
        };
        log::trace!("<- {} {:?}", header.object, event);
        self.handle(header.object, event)
    }

    fn handle(&mut self, sender: ObjectId, event: WlEvent) -> BackendResult<()> {
        match event {
            WlEvent::Global {
                name,
                interface,
                version,
            } if sender == self.registry => {
                self.globals.announce(&interface, name, version);
            }
            WlEvent::GlobalRemove { name } if sender == self.registry => {
                if let Some(interface) = self.globals.remove(name) {
                    log::debug!("Global {} ({}) removed", name, interface);
                }
            }
            WlEvent::CallbackDone { .. } => {
                self.done.insert(sender);
            }
            WlEvent::DeleteId { id } => {
                self.objects.remove(ObjectId(id));
            }
            WlEvent::Ping { serial } => {
                self.send(sender, &WlRequest::Pong { serial })?;
                self.flush()?;
            }
            WlEvent::DisplayError {
                object,
                code,
                ref message,
            } => {
                log::error!("Compositor error on {}: {} ({})", object, message, code);
                self.events.push_back((sender, event));
            }
            event => self.events.push_back((sender, event)),
        }
        Ok(())
    }

    /// Next event not consumed by the connection itself
    pub fn next_event(&mut self) -> Option<(ObjectId, WlEvent)> {
        self.events.pop_front()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub fn close(&mut self) {
        self.transport.close();
    }
}
