//! Scripted display servers for the integration tests
//!
//! Each server listens on a Unix socket inside a temporary directory, serves
//! exactly one client on a background thread and returns everything the
//! client sent once the client hangs up.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{IoSliceMut, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use framewire::config::{DisplayAddress, WaylandConfig, X11Config};
use framewire::protocol::wayland::{ObjectId, WlEvent, HEADER_LEN};
use framewire::protocol::x11::*;
use framewire::{Backend, BackendEvent};
use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll until `pred` holds for the collected events or two seconds pass.
pub fn poll_until<F>(backend: &mut dyn Backend, pred: F) -> Vec<BackendEvent>
where
    F: Fn(&[BackendEvent]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut events = Vec::new();
    while !pred(&events) && Instant::now() < deadline {
        events.extend(backend.poll_events().unwrap());
        thread::sleep(Duration::from_millis(1));
    }
    events
}

/// One 24-bit screen, ids from 0x04400000
pub fn x11_setup() -> SetupSuccess {
    SetupSuccess {
        protocol_major_version: 11,
        protocol_minor_version: 0,
        release_number: 12_101_004,
        resource_id_base: 0x0440_0000,
        resource_id_mask: 0x001f_ffff,
        motion_buffer_size: 256,
        maximum_request_length: 65535,
        image_byte_order: 0,
        bitmap_format_bit_order: 0,
        bitmap_format_scanline_unit: 32,
        bitmap_format_scanline_pad: 32,
        min_keycode: 8,
        max_keycode: 255,
        vendor: "Fake X".to_string(),
        pixmap_formats: vec![Format {
            depth: 24,
            bits_per_pixel: 32,
            scanline_pad: 32,
        }],
        roots: vec![Screen {
            root: Window::new(0x536),
            default_colormap: 0x20,
            white_pixel: 0x00ff_ffff,
            black_pixel: 0,
            current_input_masks: 0,
            width_in_pixels: 1024,
            height_in_pixels: 768,
            width_in_millimeters: 270,
            height_in_millimeters: 203,
            min_installed_maps: 1,
            max_installed_maps: 1,
            root_visual: VisualID::new(0x21),
            backing_stores: 0,
            save_unders: false,
            root_depth: 24,
            allowed_depths: vec![Depth {
                depth: 24,
                visuals: vec![VisualType {
                    visual_id: VisualID::new(0x21),
                    class: 4,
                    bits_per_rgb_value: 8,
                    colormap_entries: 256,
                    red_mask: 0x00ff_0000,
                    green_mask: 0x0000_ff00,
                    blue_mask: 0x0000_00ff,
                }],
            }],
        }],
    }
}

/// Atom the fake X server assigns to the n-th distinct interned name
pub const FIRST_ATOM: u32 = 0x100;

/// A request as the fake X server saw it
#[derive(Debug, Clone)]
pub struct X11Request {
    pub sequence: u16,
    pub bytes: Vec<u8>,
}

impl X11Request {
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }
}

pub struct FakeXServer {
    pub config: X11Config,
    handle: JoinHandle<Vec<X11Request>>,
    _dir: TempDir,
}

impl FakeXServer {
    /// Start a server that answers InternAtom and calls `hook` after every
    /// request so a test can push events.
    pub fn start<F>(hook: F) -> Self
    where
        F: FnMut(&X11Request, &mut UnixStream) + Send + 'static,
    {
        Self::with_setup(x11_setup(), hook)
    }

    /// Like [`FakeXServer::start`], answering the handshake with `setup`.
    pub fn with_setup<F>(setup: SetupSuccess, mut hook: F) -> Self
    where
        F: FnMut(&X11Request, &mut UnixStream) + Send + 'static,
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X0");
        let listener = UnixListener::bind(&path).unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut setup_request = [0u8; SETUP_REQUEST_LEN];
            stream.read_exact(&mut setup_request).unwrap();
            SetupRequest::parse(&setup_request).unwrap();
            stream.write_all(&setup.encode()).unwrap();

            let mut atoms: HashMap<String, u32> = HashMap::new();
            let mut requests = Vec::new();
            let mut sequence: u16 = 0;
            loop {
                let mut header = [0u8; 4];
                if stream.read_exact(&mut header).is_err() {
                    break;
                }
                let len = u16::from_le_bytes([header[2], header[3]]) as usize * 4;
                let mut bytes = header.to_vec();
                bytes.resize(len, 0);
                if stream.read_exact(&mut bytes[4..]).is_err() {
                    break;
                }
                sequence = sequence.wrapping_add(1);
                let request = X11Request { sequence, bytes };

                if request.opcode() == RequestOpcode::InternAtom as u8 {
                    let name_len = u16::from_le_bytes([request.bytes[4], request.bytes[5]]) as usize;
                    let name = String::from_utf8_lossy(&request.bytes[8..8 + name_len]).to_string();
                    let next = FIRST_ATOM + atoms.len() as u32;
                    let atom = *atoms.entry(name).or_insert(next);
                    let mut reply = [0u8; 32];
                    reply[0] = 1;
                    reply[2..4].copy_from_slice(&sequence.to_le_bytes());
                    reply[8..12].copy_from_slice(&atom.to_le_bytes());
                    stream.write_all(&reply).unwrap();
                }
                hook(&request, &mut stream);
                requests.push(request);
            }
            requests
        });

        FakeXServer {
            config: X11Config {
                address: DisplayAddress::Unix(path),
                screen: 0,
            },
            handle,
            _dir: dir,
        }
    }

    /// Wait for the client to disconnect and return its requests.
    pub fn finish(self) -> Vec<X11Request> {
        self.handle.join().unwrap()
    }
}

/// A request as the fake compositor saw it
#[derive(Debug)]
pub struct WlMessage {
    pub object: u32,
    pub interface: &'static str,
    pub opcode: u16,
    pub args: Vec<u8>,
    /// Descriptor passed along with the message
    pub fd: Option<OwnedFd>,
}

impl WlMessage {
    pub fn arg(&self, index: usize) -> u32 {
        u32::from_le_bytes(self.args[index * 4..index * 4 + 4].try_into().unwrap())
    }

    pub fn is(&self, interface: &str, opcode: u16) -> bool {
        self.interface == interface && self.opcode == opcode
    }
}

/// Serial the fake compositor sends with its first xdg_surface.configure
pub const CONFIGURE_SERIAL: u32 = 7;

pub fn send_event(stream: &mut UnixStream, sender: u32, event: WlEvent) {
    stream
        .write_all(&event.encode(ObjectId(sender)).unwrap())
        .unwrap();
}

/// Reads whole messages and the descriptors that travel with them.
struct MessageReader {
    buf: Vec<u8>,
    fds: Vec<OwnedFd>,
}

impl MessageReader {
    fn fill(&mut self, fd: RawFd) -> bool {
        let mut chunk = [0u8; 4096];
        let mut iov = [IoSliceMut::new(&mut chunk)];
        let mut space = nix::cmsg_space!([RawFd; 4]);
        let (bytes, received) = {
            let msg = match recvmsg::<()>(fd, &mut iov, Some(&mut space), MsgFlags::empty()) {
                Ok(msg) => msg,
                Err(_) => return false,
            };
            let mut received = Vec::new();
            for cmsg in msg.cmsgs().unwrap() {
                if let ControlMessageOwned::ScmRights(fds) = cmsg {
                    received.extend(fds);
                }
            }
            (msg.bytes, received)
        };
        for raw in received {
            self.fds.push(unsafe { OwnedFd::from_raw_fd(raw) });
        }
        self.buf.extend_from_slice(&chunk[..bytes]);
        bytes > 0
    }

    /// (object, opcode, args) of the next message, or `None` on hang-up
    fn next(&mut self, fd: RawFd) -> Option<(u32, u16, Vec<u8>)> {
        loop {
            if self.buf.len() >= HEADER_LEN {
                let object = u32::from_le_bytes(self.buf[0..4].try_into().unwrap());
                let word = u32::from_le_bytes(self.buf[4..8].try_into().unwrap());
                let size = (word >> 16) as usize;
                if self.buf.len() >= size {
                    let args = self.buf[HEADER_LEN..size].to_vec();
                    self.buf.drain(..size);
                    return Some((object, (word & 0xffff) as u16, args));
                }
            }
            if !self.fill(fd) {
                return None;
            }
        }
    }
}

fn read_string(args: &[u8], offset: usize) -> (String, usize) {
    let len = u32::from_le_bytes(args[offset..offset + 4].try_into().unwrap()) as usize;
    let text = String::from_utf8_lossy(&args[offset + 4..offset + 4 + len - 1]).to_string();
    (text, offset + 4 + (len + 3) / 4 * 4)
}

pub struct FakeCompositor {
    pub config: WaylandConfig,
    handle: JoinHandle<Vec<WlMessage>>,
    _dir: TempDir,
}

impl FakeCompositor {
    /// Start a compositor advertising `globals`. It answers sync, sends the
    /// first configure on the first commit, advertises pointer and keyboard
    /// on a bound seat, and calls `hook` after every message.
    pub fn start<F>(globals: &'static [(&'static str, u32)], mut hook: F) -> Self
    where
        F: FnMut(&WlMessage, &mut UnixStream) + Send + 'static,
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wayland-test");
        let listener = UnixListener::bind(&path).unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let fd = stream.as_raw_fd();
            let mut reader = MessageReader {
                buf: Vec::new(),
                fds: Vec::new(),
            };
            let mut kinds: HashMap<u32, &'static str> = HashMap::new();
            kinds.insert(1, "wl_display");
            let mut toplevel = 0;
            let mut xdg_surface = 0;
            let mut configured = false;
            let mut messages = Vec::new();

            while let Some((object, opcode, args)) = reader.next(fd) {
                let interface = kinds.get(&object).copied().unwrap_or("unknown");
                let mut message = WlMessage {
                    object,
                    interface,
                    opcode,
                    args,
                    fd: None,
                };

                match (interface, opcode) {
                    ("wl_display", 0) => {
                        let callback = message.arg(0);
                        send_event(&mut stream, callback, WlEvent::CallbackDone { data: 0 });
                        send_event(&mut stream, 1, WlEvent::DeleteId { id: callback });
                    }
                    ("wl_display", 1) => {
                        let registry = message.arg(0);
                        kinds.insert(registry, "wl_registry");
                        for (i, (name, version)) in globals.iter().enumerate() {
                            send_event(
                                &mut stream,
                                registry,
                                WlEvent::Global {
                                    name: i as u32 + 1,
                                    interface: name.to_string(),
                                    version: *version,
                                },
                            );
                        }
                    }
                    ("wl_registry", 0) => {
                        let (name, next) = read_string(&message.args, 4);
                        let id = u32::from_le_bytes(
                            message.args[next + 4..next + 8].try_into().unwrap(),
                        );
                        let interface = match name.as_str() {
                            "wl_compositor" => "wl_compositor",
                            "wl_shm" => "wl_shm",
                            "xdg_wm_base" => "xdg_wm_base",
                            "wl_seat" => "wl_seat",
                            _ => "unknown",
                        };
                        kinds.insert(id, interface);
                        if interface == "wl_seat" {
                            send_event(&mut stream, id, WlEvent::SeatCapabilities { capabilities: 3 });
                        }
                    }
                    ("wl_compositor", 0) => {
                        kinds.insert(message.arg(0), "wl_surface");
                    }
                    ("wl_surface", 6) if !configured => {
                        configured = true;
                        send_event(
                            &mut stream,
                            toplevel,
                            WlEvent::ToplevelConfigure {
                                width: 0,
                                height: 0,
                                states: Vec::new(),
                            },
                        );
                        send_event(
                            &mut stream,
                            xdg_surface,
                            WlEvent::XdgSurfaceConfigure {
                                serial: CONFIGURE_SERIAL,
                            },
                        );
                    }
                    ("wl_shm", 0) => {
                        kinds.insert(message.arg(0), "wl_shm_pool");
                        if !reader.fds.is_empty() {
                            message.fd = Some(reader.fds.remove(0));
                        }
                    }
                    ("wl_shm_pool", 0) => {
                        kinds.insert(message.arg(0), "wl_buffer");
                    }
                    ("xdg_wm_base", 2) => {
                        xdg_surface = message.arg(0);
                        kinds.insert(xdg_surface, "xdg_surface");
                    }
                    ("xdg_surface", 1) => {
                        toplevel = message.arg(0);
                        kinds.insert(toplevel, "xdg_toplevel");
                    }
                    ("wl_seat", 0) => {
                        kinds.insert(message.arg(0), "wl_pointer");
                    }
                    ("wl_seat", 1) => {
                        kinds.insert(message.arg(0), "wl_keyboard");
                    }
                    _ => {}
                }

                hook(&message, &mut stream);
                messages.push(message);
            }
            messages
        });

        FakeCompositor {
            config: WaylandConfig::new(path),
            handle,
            _dir: dir,
        }
    }

    /// Wait for the client to disconnect and return its messages.
    pub fn finish(self) -> Vec<WlMessage> {
        self.handle.join().unwrap()
    }
}
