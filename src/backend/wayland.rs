//! Wayland Backend - one xdg toplevel on a compositor
//!
//! Frames are written into a shared-memory buffer and handed over with
//! attach, damage and commit. The buffer is reused until the frame size
//! changes.

use std::collections::VecDeque;

use super::*;
use crate::client::wayland::WaylandConnection;
use crate::config::{WaylandConfig, WindowOptions};
use crate::error::{BackendError, BackendResult};
use crate::framebuffer::Framebuffer;
use crate::protocol::wayland::*;
use crate::protocol::EncodeError;
use crate::shm::{ShmBuffer, ShmFile};

pub struct WaylandBackend {
    conn: WaylandConnection,
    shm: ObjectId,
    seat: Option<ObjectId>,
    pointer: Option<ObjectId>,
    keyboard: Option<ObjectId>,
    surface: ObjectId,
    xdg_surface: ObjectId,
    toplevel: ObjectId,
    buffer: Option<ShmBuffer>,
    width: u32,
    height: u32,
    /// Last pointer position, reported with button events
    pointer_pos: (i32, i32),
    configured: bool,
    /// Events translated during setup, handed out by the first poll
    pending: VecDeque<BackendEvent>,
    state: BackendState,
    close_flag: CloseFlag,
}

impl WaylandBackend {
    /// Connect to the compositor and open a toplevel window.
    pub fn connect(config: &WaylandConfig, options: &WindowOptions) -> BackendResult<Self> {
        let conn = WaylandConnection::connect(config)?;
        Self::with_connection(conn, options)
    }

    /// Bind the globals and create the window over a connection whose
    /// registry has already been collected.
    pub fn with_connection(
        mut conn: WaylandConnection,
        options: &WindowOptions,
    ) -> BackendResult<Self> {
        log::debug!("Wayland backend state: {}", BackendState::HandshakeDone);

        let compositor = conn.bind(ObjectKind::Compositor, max_version::COMPOSITOR)?;
        let shm = conn.bind(ObjectKind::Shm, max_version::SHM)?;
        let wm_base = conn.bind(ObjectKind::XdgWmBase, max_version::XDG_WM_BASE)?;
        let seat = conn.bind_optional(ObjectKind::Seat, max_version::SEAT)?;
        if seat.is_none() {
            log::info!("Compositor has no wl_seat, input disabled");
        }
        log::debug!("Wayland backend state: {}", BackendState::GlobalsBound);

        let surface = conn.new_object(ObjectKind::Surface)?;
        conn.send(compositor, &WlRequest::CreateSurface { id: surface })?;
        let xdg_surface = conn.new_object(ObjectKind::XdgSurface)?;
        conn.send(
            wm_base,
            &WlRequest::GetXdgSurface {
                id: xdg_surface,
                surface,
            },
        )?;
        let toplevel = conn.new_object(ObjectKind::XdgToplevel)?;
        conn.send(xdg_surface, &WlRequest::GetToplevel { id: toplevel })?;
        conn.send(
            toplevel,
            &WlRequest::SetTitle {
                title: &options.title,
            },
        )?;

        // No buffer yet: the compositor answers with the first configure
        conn.send(surface, &WlRequest::Commit)?;
        conn.roundtrip()?;

        let mut backend = WaylandBackend {
            conn,
            shm,
            seat,
            pointer: None,
            keyboard: None,
            surface,
            xdg_surface,
            toplevel,
            buffer: None,
            width: options.width.max(1),
            height: options.height.max(1),
            pointer_pos: (0, 0),
            configured: false,
            pending: VecDeque::new(),
            state: BackendState::GlobalsBound,
            close_flag: CloseFlag::default(),
        };
        backend.drain_events()?;
        backend.conn.flush()?;
        if !backend.configured {
            log::warn!("Compositor did not configure the surface during setup");
        }

        backend.state = BackendState::Ready;
        log::info!(
            "Created Wayland toplevel {} ({}x{})",
            backend.toplevel,
            backend.width,
            backend.height
        );
        Ok(backend)
    }

    pub fn surface(&self) -> ObjectId {
        self.surface
    }

    /// Translate everything the connection has queued.
    fn drain_events(&mut self) -> BackendResult<()> {
        while let Some((sender, event)) = self.conn.next_event() {
            if let Some(event) = self.translate(sender, event)? {
                self.pending.push_back(event);
            }
        }
        Ok(())
    }

    fn translate(&mut self, sender: ObjectId, event: WlEvent) -> BackendResult<Option<BackendEvent>> {
        let event = match event {
            WlEvent::DisplayError {
                object,
                code,
                message,
            } => BackendEvent::ProtocolError {
                code,
                message: format!("{}: {}", object, message),
            },
            WlEvent::XdgSurfaceConfigure { serial } => {
                self.conn
                    .send(self.xdg_surface, &WlRequest::AckConfigure { serial })?;
                self.configured = true;
                return Ok(None);
            }
            WlEvent::ToplevelConfigure { width, height, .. } => {
                // Zero means the client picks
                if width <= 0 || height <= 0 {
                    return Ok(None);
                }
                let (width, height) = (width as u32, height as u32);
                if (width, height) == (self.width, self.height) {
                    return Ok(None);
                }
                self.width = width;
                self.height = height;
                BackendEvent::Resize { width, height }
            }
            WlEvent::ToplevelClose => {
                log::debug!("Compositor requested close");
                self.close_flag.set();
                BackendEvent::Close
            }
            WlEvent::SeatCapabilities { capabilities } => {
                self.update_seat(sender, capabilities)?;
                return Ok(None);
            }
            WlEvent::PointerEnter { x, y, .. } | WlEvent::PointerMotion { x, y, .. } => {
                self.pointer_pos = (x as i32, y as i32);
                BackendEvent::MouseMove {
                    x: self.pointer_pos.0,
                    y: self.pointer_pos.1,
                }
            }
            WlEvent::PointerButton { button, state, .. } => {
                let (x, y) = self.pointer_pos;
                let button = x11_button(button);
                if state == wl_pointer::BUTTON_PRESSED {
                    BackendEvent::MousePress { x, y, button }
                } else {
                    BackendEvent::MouseRelease { x, y, button }
                }
            }
            WlEvent::KeyboardKey { key, state, .. } => {
                let key = key + wl_keyboard::EVDEV_OFFSET;
                if state == wl_keyboard::KEY_PRESSED {
                    BackendEvent::KeyPress { key }
                } else {
                    BackendEvent::KeyRelease { key }
                }
            }
            WlEvent::BufferRelease
            | WlEvent::ShmFormat { .. }
            | WlEvent::PointerLeave { .. } => return Ok(None),
            WlEvent::Other { kind, opcode } => {
                log::debug!("Unhandled {} event {}", kind.interface(), opcode);
                BackendEvent::Unknown {
                    code: u32::from(opcode),
                }
            }
            other => {
                log::debug!("Ignoring {:?} from {}", other, sender);
                BackendEvent::Unknown {
                    code: u32::from(other.opcode()),
                }
            }
        };
        Ok(Some(event))
    }

    fn update_seat(&mut self, seat: ObjectId, capabilities: u32) -> BackendResult<()> {
        if Some(seat) != self.seat {
            return Ok(());
        }
        if capabilities & wl_seat::capability::POINTER != 0 && self.pointer.is_none() {
            let id = self.conn.new_object(ObjectKind::Pointer)?;
            self.conn.send(seat, &WlRequest::GetPointer { id })?;
            self.pointer = Some(id);
        }
        if capabilities & wl_seat::capability::KEYBOARD != 0 && self.keyboard.is_none() {
            let id = self.conn.new_object(ObjectKind::Keyboard)?;
            self.conn.send(seat, &WlRequest::GetKeyboard { id })?;
            self.keyboard = Some(id);
        }
        self.conn.flush()
    }

    /// Create a pool and buffer sized for a `width` x `height` frame,
    /// releasing the previous pair.
    fn allocate_buffer(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.destroy_buffer()?;

        let size = ShmBuffer::size_for(width, height);
        let too_large = || {
            BackendError::Encode(EncodeError::TooLarge {
                bytes: size,
                max_bytes: i32::MAX as usize,
            })
        };
        let pool_size = i32::try_from(size).map_err(|_| too_large())?;

        let file = ShmFile::create(size)?;
        let pool = self.conn.new_object(ObjectKind::ShmPool)?;
        self.conn.send_with_fd(
            self.shm,
            &WlRequest::CreatePool {
                id: pool,
                size: pool_size,
            },
            file.as_fd(),
        )?;
        let buffer = ShmBuffer {
            file,
            pool,
            buffer: self.conn.new_object(ObjectKind::Buffer)?,
            width,
            height,
        };
        let stride = i32::try_from(buffer.stride()).map_err(|_| too_large())?;
        self.conn.send(
            pool,
            &WlRequest::CreateBuffer {
                id: buffer.buffer,
                offset: 0,
                width: width as i32,
                height: height as i32,
                stride,
                format: wl_shm::format::ARGB8888,
            },
        )?;

        log::debug!(
            "Allocated {}x{} shm buffer {} ({} bytes)",
            width,
            height,
            buffer.buffer,
            size
        );
        self.buffer = Some(buffer);
        Ok(())
    }

    fn destroy_buffer(&mut self) -> BackendResult<()> {
        if let Some(old) = self.buffer.take() {
            self.conn.send(old.buffer, &WlRequest::BufferDestroy)?;
            self.conn.send(old.pool, &WlRequest::PoolDestroy)?;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.conn.close();
        self.state = BackendState::Closed;
        self.close_flag.set();
    }

    fn destroy_window(&mut self) -> BackendResult<()> {
        self.conn.send(self.toplevel, &WlRequest::ToplevelDestroy)?;
        self.conn.send(self.xdg_surface, &WlRequest::XdgSurfaceDestroy)?;
        self.conn.send(self.surface, &WlRequest::SurfaceDestroy)?;
        self.destroy_buffer()?;
        self.conn.flush()
    }
}

/// evdev button code to X11 button number
fn x11_button(code: u32) -> u8 {
    match code {
        wl_pointer::button::LEFT => 1,
        wl_pointer::button::MIDDLE => 2,
        wl_pointer::button::RIGHT => 3,
        other => {
            log::debug!("Unmapped pointer button 0x{:x}", other);
            0
        }
    }
}

impl Backend for WaylandBackend {
    fn name(&self) -> &'static str {
        "wayland"
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &Framebuffer) -> BackendResult<()> {
        if self.state == BackendState::Closed {
            return Ok(());
        }
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Ok(());
        }

        if !self.buffer.as_ref().is_some_and(|b| b.fits(width, height)) {
            self.allocate_buffer(width, height)?;
        }
        let Some(shm) = self.buffer.as_mut() else {
            return Ok(());
        };
        shm.write(&frame.to_bgra_bytes())?;
        let buffer = shm.buffer;

        self.conn
            .send(self.surface, &WlRequest::Attach { buffer, x: 0, y: 0 })?;
        self.conn.send(
            self.surface,
            &WlRequest::Damage {
                x: 0,
                y: 0,
                width: width as i32,
                height: height as i32,
            },
        )?;
        self.conn.send(self.surface, &WlRequest::Commit)?;

        log::trace!("Presented {}x{} frame", width, height);
        match self.conn.flush() {
            Err(BackendError::Disconnected) => {
                log::warn!("Compositor went away while presenting");
                self.shutdown();
                Ok(())
            }
            other => other,
        }
    }

    fn poll_events(&mut self) -> BackendResult<Vec<BackendEvent>> {
        let mut events: Vec<BackendEvent> = self.pending.drain(..).collect();
        if self.state == BackendState::Closed {
            return Ok(events);
        }

        let disconnected = match self.conn.dispatch_pending() {
            Ok(_) => false,
            Err(BackendError::Disconnected) => true,
            Err(BackendError::Malformed(e)) => {
                log::warn!("Dropping malformed message: {}", e);
                false
            }
            Err(e) => return Err(e),
        };

        // Events read before a hang-up are still delivered
        while let Some((sender, event)) = self.conn.next_event() {
            match self.translate(sender, event) {
                Ok(translated) => events.extend(translated),
                Err(e) if disconnected => log::debug!("Dropping event after hang-up: {}", e),
                Err(e) => return Err(e),
            }
        }
        if disconnected {
            log::warn!("Compositor closed the connection");
            self.shutdown();
            if !events.contains(&BackendEvent::Close) {
                events.push(BackendEvent::Close);
            }
            return Ok(events);
        }
        match self.conn.flush() {
            Ok(()) | Err(BackendError::Disconnected) => {}
            Err(e) => return Err(e),
        }
        Ok(events)
    }

    fn should_close(&self) -> bool {
        self.close_flag.get()
    }

    fn close(&mut self) -> BackendResult<()> {
        if self.state == BackendState::Closed {
            return Ok(());
        }

        if let Err(e) = self.destroy_window() {
            log::warn!("Could not destroy toplevel cleanly: {}", e);
        }

        self.shutdown();
        log::info!("Closed Wayland toplevel {}", self.toplevel);
        Ok(())
    }
}

impl Drop for WaylandBackend {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
