//! Wayland backend against a scripted compositor

mod common;

use std::fs::File;
use std::os::unix::fs::FileExt;

use common::*;
use framewire::backend::wayland::WaylandBackend;
use framewire::client::wayland::WaylandConnection;
use framewire::protocol::wayland::*;
use framewire::{Backend, BackendError, BackendEvent, BackendState, Color, Framebuffer, WindowOptions};

const DESKTOP: &[(&str, u32)] = &[("wl_compositor", 5), ("wl_shm", 1), ("xdg_wm_base", 3)];

const DESKTOP_WITH_SEAT: &[(&str, u32)] = &[
    ("wl_compositor", 4),
    ("wl_shm", 1),
    ("xdg_wm_base", 2),
    ("wl_seat", 7),
];

fn options(width: u32, height: u32) -> WindowOptions {
    WindowOptions {
        width,
        height,
        title: "test".to_string(),
    }
}

fn position(messages: &[WlMessage], interface: &str, opcode: u16) -> usize {
    messages
        .iter()
        .position(|m| m.is(interface, opcode))
        .unwrap_or_else(|| panic!("no {}.{} request", interface, opcode))
}

#[test]
fn test_bound_globals_get_fresh_increasing_ids() {
    init_logging();
    let compositor = FakeCompositor::start(DESKTOP, |_, _| {});
    let mut backend = WaylandBackend::connect(&compositor.config, &options(8, 8)).unwrap();
    assert_eq!(backend.state(), BackendState::Ready);
    backend.close().unwrap();

    let messages = compositor.finish();
    let mut earlier = Vec::new();
    let mut bound = Vec::new();
    for m in &messages {
        match (m.interface, m.opcode) {
            ("wl_display", _) => earlier.push(m.arg(0)),
            ("wl_registry", 0) => {
                // The new id is the last argument
                let id = m.arg(m.args.len() / 4 - 1);
                assert!(!earlier.contains(&id));
                assert!(!bound.contains(&id));
                bound.push(id);
            }
            _ => {}
        }
    }
    assert_eq!(bound.len(), 3);
    assert!(bound.windows(2).all(|w| w[0] < w[1]));
    assert!(bound[0] > earlier[0]);

    // Versions are capped at what the client understands
    let versions: Vec<u32> = messages
        .iter()
        .filter(|m| m.is("wl_registry", 0))
        .map(|m| m.arg(m.args.len() / 4 - 2))
        .collect();
    assert_eq!(versions, vec![4, 1, 2]);
}

#[test]
fn test_missing_shell_is_fatal() {
    init_logging();
    let compositor = FakeCompositor::start(&[("wl_compositor", 4), ("wl_shm", 1)], |_, _| {});
    let result = WaylandBackend::connect(&compositor.config, &options(8, 8));
    assert!(matches!(
        result,
        Err(BackendError::MissingGlobal("xdg_wm_base"))
    ));
    drop(result);

    let messages = compositor.finish();
    assert!(!messages.iter().any(|m| m.is("wl_compositor", 0)));
}

#[test]
fn test_present_writes_shm_and_commits() {
    init_logging();
    let compositor = FakeCompositor::start(DESKTOP, |_, _| {});
    let mut backend = WaylandBackend::connect(&compositor.config, &options(4, 4)).unwrap();

    let mut frame = Framebuffer::new(4, 4);
    frame.fill(Color::BLUE);
    backend.present(&frame).unwrap();
    let surface_id = backend.surface().get();
    backend.close().unwrap();

    let messages = compositor.finish();

    // The initial configure was acknowledged with its serial
    let ack = &messages[position(&messages, "xdg_surface", xdg_surface::req::ACK_CONFIGURE)];
    assert_eq!(ack.arg(0), CONFIGURE_SERIAL);

    let pool = &messages[position(&messages, "wl_shm", wl_shm::req::CREATE_POOL)];
    assert_eq!(pool.arg(1), 64);

    let buffer = &messages[position(&messages, "wl_shm_pool", wl_shm_pool::req::CREATE_BUFFER)];
    // id, offset, width, height, stride, format
    assert_eq!(buffer.arg(1), 0);
    assert_eq!((buffer.arg(2), buffer.arg(3)), (4, 4));
    assert_eq!(buffer.arg(4), 16);
    assert_eq!(buffer.arg(5), wl_shm::format::ARGB8888);

    let attach = position(&messages, "wl_surface", wl_surface::req::ATTACH);
    let damage = position(&messages, "wl_surface", wl_surface::req::DAMAGE);
    assert_eq!(messages[attach].object, surface_id);
    assert_eq!(messages[attach].arg(0), buffer.arg(0));
    assert_eq!(
        (messages[damage].arg(2), messages[damage].arg(3)),
        (4, 4)
    );
    assert!(attach < damage);
    assert!(messages[damage + 1].is("wl_surface", wl_surface::req::COMMIT));

    // Pixels reached the pool in BGRA order
    let fd = pool.fd.as_ref().expect("pool descriptor");
    let file = File::from(fd.try_clone().unwrap());
    let mut contents = [0u8; 64];
    file.read_exact_at(&mut contents, 0).unwrap();
    assert!(contents.chunks(4).all(|p| p == [255, 0, 0, 255]));

    // Torn down top-down
    let toplevel = position(&messages, "xdg_toplevel", xdg_toplevel::req::DESTROY);
    let surface = position(&messages, "wl_surface", wl_surface::req::DESTROY);
    let pool_destroy = position(&messages, "wl_shm_pool", wl_shm_pool::req::DESTROY);
    assert!(toplevel < surface);
    assert!(surface < pool_destroy);
}

#[test]
fn test_resized_frame_gets_a_new_buffer() {
    init_logging();
    let compositor = FakeCompositor::start(DESKTOP, |_, _| {});
    let mut backend = WaylandBackend::connect(&compositor.config, &options(4, 4)).unwrap();

    backend.present(&Framebuffer::new(4, 4)).unwrap();
    backend.present(&Framebuffer::new(4, 4)).unwrap();
    backend.present(&Framebuffer::new(8, 2)).unwrap();
    backend.close().unwrap();

    let messages = compositor.finish();
    let pools: Vec<&WlMessage> = messages
        .iter()
        .filter(|m| m.is("wl_shm", wl_shm::req::CREATE_POOL))
        .collect();
    assert_eq!(pools.len(), 2);
    assert_eq!(pools[1].arg(1), 64);
    let destroyed = messages
        .iter()
        .filter(|m| m.is("wl_buffer", wl_buffer::req::DESTROY))
        .count();
    assert_eq!(destroyed, 2);
}

#[test]
fn test_toplevel_close_sets_should_close() {
    init_logging();
    let compositor = FakeCompositor::start(DESKTOP, |message, stream| {
        if message.is("xdg_surface", xdg_surface::req::ACK_CONFIGURE) {
            let toplevel = message.object + 1;
            send_event(stream, toplevel, WlEvent::ToplevelClose);
        }
    });
    let mut backend = WaylandBackend::connect(&compositor.config, &options(4, 4)).unwrap();

    let events = poll_until(&mut backend, |e| e.contains(&BackendEvent::Close));
    assert!(events.contains(&BackendEvent::Close));
    assert!(backend.should_close());
    backend.poll_events().unwrap();
    assert!(backend.should_close());

    backend.close().unwrap();
    backend.close().unwrap();
    assert_eq!(backend.state(), BackendState::Closed);
    compositor.finish();
}

#[test]
fn test_seat_input_is_translated() {
    init_logging();
    let compositor = FakeCompositor::start(DESKTOP_WITH_SEAT, |message, stream| {
        if message.is("wl_seat", wl_seat::req::GET_POINTER) {
            let pointer = message.arg(0);
            send_event(
                stream,
                pointer,
                WlEvent::PointerMotion {
                    time: 1,
                    x: 10.5,
                    y: 20.0,
                },
            );
            send_event(
                stream,
                pointer,
                WlEvent::PointerButton {
                    serial: 2,
                    time: 2,
                    button: wl_pointer::button::RIGHT,
                    state: wl_pointer::BUTTON_PRESSED,
                },
            );
        }
        if message.is("wl_seat", wl_seat::req::GET_KEYBOARD) {
            send_event(
                stream,
                message.arg(0),
                WlEvent::KeyboardKey {
                    serial: 3,
                    time: 3,
                    key: 30,
                    state: wl_keyboard::KEY_PRESSED,
                },
            );
        }
    });
    let mut backend = WaylandBackend::connect(&compositor.config, &options(4, 4)).unwrap();

    let events = poll_until(&mut backend, |e| e.len() >= 3);
    assert_eq!(
        events,
        vec![
            BackendEvent::MouseMove { x: 10, y: 20 },
            BackendEvent::MousePress {
                x: 10,
                y: 20,
                button: 3
            },
            BackendEvent::KeyPress { key: 38 },
        ]
    );
    backend.close().unwrap();
    compositor.finish();
}

#[test]
fn test_resize_before_hang_up_is_delivered() {
    init_logging();
    let compositor = FakeCompositor::start(DESKTOP, |message, stream| {
        if message.is("xdg_surface", xdg_surface::req::ACK_CONFIGURE) {
            let toplevel = message.object + 1;
            send_event(
                stream,
                toplevel,
                WlEvent::ToplevelConfigure {
                    width: 300,
                    height: 200,
                    states: Vec::new(),
                },
            );
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }
    });
    let mut backend = WaylandBackend::connect(&compositor.config, &options(4, 4)).unwrap();

    let events = poll_until(&mut backend, |e| e.contains(&BackendEvent::Close));
    let resize = events
        .iter()
        .position(|e| {
            *e == BackendEvent::Resize {
                width: 300,
                height: 200,
            }
        })
        .expect("resize delivered");
    let close = events
        .iter()
        .position(|e| *e == BackendEvent::Close)
        .expect("close delivered");
    assert!(resize < close);
    assert_eq!(backend.size(), (300, 200));
    assert!(backend.should_close());
    assert_eq!(backend.state(), BackendState::Closed);

    backend.close().unwrap();
    compositor.finish();
}

#[test]
fn test_removed_global_is_not_bound() {
    init_logging();
    // wl_shm is announced as name 2, then withdrawn
    let compositor = FakeCompositor::start(DESKTOP, |message, stream| {
        if message.is("wl_display", 1) {
            send_event(stream, message.arg(0), WlEvent::GlobalRemove { name: 2 });
        }
    });
    let mut conn = WaylandConnection::connect(&compositor.config).unwrap();

    assert!(conn.globals().get("wl_shm").is_none());
    assert!(conn.globals().get("wl_compositor").is_some());
    assert!(matches!(
        conn.bind(ObjectKind::Shm, max_version::SHM),
        Err(BackendError::MissingGlobal("wl_shm"))
    ));
    conn.close();

    let messages = compositor.finish();
    assert!(!messages.iter().any(|m| m.is("wl_registry", 0)));
}

#[test]
fn test_window_needs_shm() {
    init_logging();
    let compositor = FakeCompositor::start(DESKTOP, |message, stream| {
        if message.is("wl_display", 1) {
            send_event(stream, message.arg(0), WlEvent::GlobalRemove { name: 2 });
        }
    });
    let result = WaylandBackend::connect(&compositor.config, &options(4, 4));
    assert!(matches!(result, Err(BackendError::MissingGlobal("wl_shm"))));
    drop(result);
    compositor.finish();
}
