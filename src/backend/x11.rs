//! X11 Backend - one window on a real X server
//!
//! Frames go out as PutImage requests carrying the whole BGRA payload, split
//! into horizontal strips when a frame exceeds the server's request limit.
//! Window manager close requests arrive as WM_DELETE_WINDOW client messages.

use super::*;
use crate::client::x11::X11Connection;
use crate::config::{WindowOptions, X11Config};
use crate::error::{BackendError, BackendResult};
use crate::framebuffer::Framebuffer;
use crate::protocol::x11::*;

/// Events the window selects
const WINDOW_EVENT_MASK: u32 = event_mask::KEY_PRESS
    | event_mask::KEY_RELEASE
    | event_mask::BUTTON_PRESS
    | event_mask::BUTTON_RELEASE
    | event_mask::POINTER_MOTION
    | event_mask::EXPOSURE
    | event_mask::STRUCTURE_NOTIFY;

pub struct X11Backend {
    conn: X11Connection,
    window: Window,
    gc: GContext,
    depth: u8,
    width: u32,
    height: u32,
    wm_delete_window: Atom,
    state: BackendState,
    close_flag: CloseFlag,
}

impl X11Backend {
    /// Connect to the display and open a window.
    pub fn connect(config: &X11Config, options: &WindowOptions) -> BackendResult<Self> {
        let conn = X11Connection::connect(config)?;
        Self::with_connection(conn, options)
    }

    /// Open a window over an already set up connection.
    pub fn with_connection(mut conn: X11Connection, options: &WindowOptions) -> BackendResult<Self> {
        log::debug!("X11 backend state: {}", conn.state());
        let screen = conn.screen().clone();
        let width = clamp_dimension(options.width);
        let height = clamp_dimension(options.height);

        let window = Window::new(conn.generate_id()?);
        conn.send(&CreateWindow {
            depth: screen.root_depth,
            wid: window,
            parent: screen.root,
            x: 0,
            y: 0,
            width,
            height,
            border_width: 0,
            class: WindowClass::InputOutput,
            visual: screen.root_visual,
            background_pixel: Some(screen.black_pixel),
            event_mask: Some(WINDOW_EVENT_MASK),
        })?;
        conn.send(&ChangeProperty::string(window, Atom::WM_NAME, &options.title))?;

        // Ask the window manager for a ClientMessage instead of a kill
        let wm_protocols = conn.intern_atom("WM_PROTOCOLS")?;
        let wm_delete_window = conn.intern_atom("WM_DELETE_WINDOW")?;
        conn.send(&ChangeProperty::atoms(
            window,
            wm_protocols,
            &[wm_delete_window],
        ))?;

        let gc = GContext::new(conn.generate_id()?);
        conn.send(&CreateGC {
            cid: gc,
            drawable: window,
            foreground: Some(screen.white_pixel),
            background: Some(screen.black_pixel),
        })?;
        conn.send(&MapWindow { window })?;
        conn.flush()?;

        log::info!(
            "Created X11 window {} ({}x{}, depth {})",
            window.id(),
            width,
            height,
            screen.root_depth
        );

        Ok(X11Backend {
            conn,
            window,
            gc,
            depth: screen.root_depth,
            width: u32::from(width),
            height: u32::from(height),
            wm_delete_window,
            state: BackendState::Ready,
            close_flag: CloseFlag::default(),
        })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    fn translate(&mut self, event: X11Event) -> Option<BackendEvent> {
        let event = match event {
            X11Event::KeyPress(e) => BackendEvent::KeyPress {
                key: u32::from(e.detail),
            },
            X11Event::KeyRelease(e) => BackendEvent::KeyRelease {
                key: u32::from(e.detail),
            },
            X11Event::ButtonPress(e) => BackendEvent::MousePress {
                x: i32::from(e.event_x),
                y: i32::from(e.event_y),
                button: e.detail,
            },
            X11Event::ButtonRelease(e) => BackendEvent::MouseRelease {
                x: i32::from(e.event_x),
                y: i32::from(e.event_y),
                button: e.detail,
            },
            X11Event::MotionNotify(e) => BackendEvent::MouseMove {
                x: i32::from(e.event_x),
                y: i32::from(e.event_y),
            },
            X11Event::Expose(_) => BackendEvent::Expose,
            X11Event::ConfigureNotify(e) => {
                let (width, height) = (u32::from(e.width), u32::from(e.height));
                if (width, height) == (self.width, self.height) {
                    // Moves and restacks also land here
                    return None;
                }
                self.width = width;
                self.height = height;
                BackendEvent::Resize { width, height }
            }
            X11Event::ClientMessage(e) => {
                if e.data[0] == self.wm_delete_window.get() {
                    log::debug!("Window manager requested close");
                    self.close_flag.set();
                    BackendEvent::Close
                } else {
                    BackendEvent::Unknown {
                        code: EventType::ClientMessage as u32,
                    }
                }
            }
            X11Event::Error(e) => {
                log::warn!(
                    "X11 error {} for request {} (sequence {})",
                    e.code,
                    e.major_opcode,
                    e.sequence
                );
                BackendEvent::ProtocolError {
                    code: u32::from(e.code),
                    message: format!(
                        "X11 error {} for request {} (value 0x{:08x})",
                        e.code, e.major_opcode, e.bad_value
                    ),
                }
            }
            X11Event::Reply(r) => {
                log::debug!("Ignoring unsolicited reply (sequence {})", r.sequence);
                return None;
            }
            X11Event::Unknown { code } => {
                log::debug!("Unhandled X11 event code {}", code);
                BackendEvent::Unknown {
                    code: u32::from(code),
                }
            }
        };
        Some(event)
    }

    fn shutdown(&mut self) {
        self.conn.close();
        self.state = BackendState::Closed;
        self.close_flag.set();
    }
}

fn clamp_dimension(value: u32) -> u16 {
    value.clamp(1, u32::from(u16::MAX)) as u16
}

impl Backend for X11Backend {
    fn name(&self) -> &'static str {
        "x11"
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

        if frame.width() == 0 || frame.height() == 0 {
            return Ok(());
        }
        let width = u16::try_from(frame.width()).map_err(|_| {
            BackendError::Encode(crate::protocol::EncodeError::TooLarge {
                bytes: frame.width() as usize * 4,
                max_bytes: u16::MAX as usize * 4,
            })
        })?;
        let height = frame.height() as usize;
        let row_bytes = width as usize * 4;
        let data = frame.to_bgra_bytes();

        let rows_per_request = PutImage::rows_per_request(row_bytes, self.conn.max_request_words());
        if rows_per_request == 0 {
            return Err(BackendError::Encode(crate::protocol::EncodeError::TooLarge {
                bytes: PutImage::FIXED_LEN + row_bytes,
                max_bytes: self.conn.max_request_words() * 4,
            }));
        }

        // dst_y is a signed 16-bit offset
        if height > i16::MAX as usize + 1 {
            return Err(BackendError::Encode(crate::protocol::EncodeError::TooLarge {
                bytes: height * row_bytes,
                max_bytes: (i16::MAX as usize + 1) * row_bytes,
            }));
        }

        let mut y = 0;
        while y < height {
            let rows = rows_per_request.min(height - y);
            let too_large = || {
                BackendError::Encode(crate::protocol::EncodeError::TooLarge {
                    bytes: PutImage::FIXED_LEN + rows * row_bytes,
                    max_bytes: self.conn.max_request_words() * 4,
                })
            };
            let strip_height = u16::try_from(rows).map_err(|_| too_large())?;
            let dst_y = i16::try_from(y).map_err(|_| too_large())?;
            self.conn.send(&PutImage {
                format: ImageFormat::ZPixmap,
                drawable: self.window,
                gc: self.gc,
                width,
                height: strip_height,
                dst_x: 0,
                dst_y,
                left_pad: 0,
                depth: self.depth,
                data: &data[y * row_bytes..(y + rows) * row_bytes],
            })?;
            y += rows;
        }

        log::trace!("Presented {}x{} frame", width, height);
        match self.conn.flush() {
            Err(BackendError::Disconnected) => {
                log::warn!("X server went away while presenting");
                self.shutdown();
                Ok(())
            }
            other => other,
        }
    }

    fn poll_events(&mut self) -> BackendResult<Vec<BackendEvent>> {
        let mut events = Vec::new();
        if self.state == BackendState::Closed {
            return Ok(events);
        }

        loop {
            match self.conn.poll_event() {
                Ok(Some(event)) => events.extend(self.translate(event)),
                Ok(None) => break,
                Err(BackendError::Disconnected) => {
                    log::warn!("X server closed the connection");
                    self.shutdown();
                    events.push(BackendEvent::Close);
                    break;
                }
                Err(BackendError::Malformed(e)) => {
                    log::warn!("Dropping malformed frame: {}", e);
                }
                Err(e) => return Err(e),
            }
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

        let result = self
            .conn
            .send(&DestroyWindow {
                window: self.window,
            })
            .and_then(|_| self.conn.flush());
        if let Err(e) = &result {
            log::warn!("Could not destroy window cleanly: {}", e);
        }

        self.shutdown();
        log::info!("Closed X11 window {}", self.window.id());
        Ok(())
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
