//! Framewire - Demo entry point
//!
//! Opens a window on the configured display and animates a gradient in it.

use std::env;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use framewire::{
    available_backends, open_backend, BackendConfig, BackendEvent, Color, FileConfig,
    Framebuffer, ImageFileFormat, WindowOptions, VERSION,
};

/// Pause between frames, roughly 60 per second
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn print_usage() {
    println!("Framewire v{}", VERSION);
    println!("Presents software-rendered frames on X11, Wayland or image files");
    println!();
    println!("Usage: framewire [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -backend <type>       Backend type (x11, wayland, file; default: from environment)");
    println!("  -display <name>       X11 display name (default: $DISPLAY)");
    println!("  -width <pixels>       Window width (default: 640)");
    println!("  -height <pixels>      Window height (default: 480)");
    println!("  -title <text>         Window title");
    println!("  -frames <n>           Exit after n frames");
    println!("  -output <dir>         Output directory for the file backend (default: .)");
    println!("  -format <fmt>         File format: ppm, ppm_binary, bmp (default: ppm)");
    println!("  -list-backends        List available backends");
    println!("  -h, --help            Show this help message");
    println!();
    println!("Examples:");
    println!("  framewire -backend x11 -display :0");
    println!("  framewire -backend file -frames 10 -format bmp -output /tmp/frames");
    println!();
}

fn list_backends() {
    println!("Available backends on this platform:");
    for backend in available_backends() {
        println!("  - {}", backend);
    }
    println!();
    println!("To build with specific backends only:");
    println!("  cargo build --no-default-features --features backend-x11");
    println!("  cargo build --no-default-features --features backend-wayland");
}

#[derive(Debug)]
struct Config {
    backend_type: Option<String>,
    display: Option<String>,
    window: WindowOptions,
    frames: Option<u64>,
    output: PathBuf,
    format: ImageFileFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend_type: None,
            display: None,
            window: WindowOptions::default(),
            frames: None,
            output: PathBuf::from("."),
            format: ImageFileFormat::Ppm,
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn parse_args() -> Result<Config, String> {
    let mut config = Config::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-list-backends" => {
                list_backends();
                process::exit(0);
            }
            "-backend" => {
                i += 1;
                config.backend_type = Some(value(&args, i, "-backend")?.to_string());
            }
            "-display" => {
                i += 1;
                config.display = Some(value(&args, i, "-display")?.to_string());
            }
            "-width" => {
                i += 1;
                config.window.width = value(&args, i, "-width")?
                    .parse()
                    .map_err(|_| "Invalid width".to_string())?;
            }
            "-height" => {
                i += 1;
                config.window.height = value(&args, i, "-height")?
                    .parse()
                    .map_err(|_| "Invalid height".to_string())?;
            }
            "-title" => {
                i += 1;
                config.window.title = value(&args, i, "-title")?.to_string();
            }
            "-frames" => {
                i += 1;
                config.frames = Some(
                    value(&args, i, "-frames")?
                        .parse()
                        .map_err(|_| "Invalid frame count".to_string())?,
                );
            }
            "-output" => {
                i += 1;
                config.output = PathBuf::from(value(&args, i, "-output")?);
            }
            "-format" => {
                i += 1;
                let name = value(&args, i, "-format")?;
                config.format = ImageFileFormat::parse(name)
                    .ok_or_else(|| format!("Invalid format: {}", name))?;
            }
            arg => {
                return Err(format!("Unknown option: {}", arg));
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Turn the command line into a backend configuration. Only an unspecified
/// backend looks at the environment.
fn resolve_backend(config: &Config) -> Result<BackendConfig, String> {
    let resolved = match config.backend_type.as_deref() {
        Some("file") => {
            let mut file = FileConfig::new(&config.output);
            file.format = config.format;
            file.max_frames = config.frames;
            return Ok(BackendConfig::File(file));
        }
        Some("x11") => {
            let display = match &config.display {
                Some(d) => d.clone(),
                None => env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string()),
            };
            BackendConfig::x11(&display)
        }
        Some("wayland") => Ok(BackendConfig::wayland_from_env()),
        Some(other) => return Err(format!("Unknown backend: {}", other)),
        None => match &config.display {
            Some(d) => BackendConfig::x11(d),
            None => BackendConfig::from_env(),
        },
    };
    resolved.map_err(|e| e.to_string())
}

/// Diagonal gradient that scrolls with `tick`
fn draw(frame: &mut Framebuffer, tick: u64) {
    let (width, height) = (frame.width().max(1), frame.height().max(1));
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            let b = ((x as u64 + y as u64 + tick * 4) % 256) as u8;
            frame.set_pixel(x, y, Color::rgb(r, g, b));
        }
    }
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let backend_config = match resolve_backend(&config) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            list_backends();
            process::exit(1);
        }
    };

    log::info!("Framewire v{}", VERSION);
    log::info!("Backend: {}", backend_config.name());

    let mut backend = match open_backend(&backend_config, &config.window) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: Failed to open {} backend: {}", backend_config.name(), e);
            process::exit(1);
        }
    };

    let (width, height) = backend.size();
    let mut frame = Framebuffer::new(width, height);
    let mut tick = 0u64;

    while !backend.should_close() {
        draw(&mut frame, tick);
        if let Err(e) = backend.present(&frame) {
            log::error!("Present failed: {}", e);
            break;
        }

        let events = match backend.poll_events() {
            Ok(events) => events,
            Err(e) => {
                log::error!("Event polling failed: {}", e);
                break;
            }
        };
        for event in events {
            match event {
                BackendEvent::Resize { width, height } => {
                    log::info!("Resized to {}x{}", width, height);
                    frame = Framebuffer::new(width, height);
                }
                BackendEvent::ProtocolError { code, message } => {
                    log::warn!("Protocol error {}: {}", code, message);
                }
                BackendEvent::Close => log::info!("Close requested"),
                other => log::debug!("Event: {:?}", other),
            }
        }

        tick += 1;
        if config.frames.is_some_and(|n| tick >= n) {
            break;
        }
        thread::sleep(FRAME_INTERVAL);
    }

    if let Err(e) = backend.close() {
        log::warn!("Close failed: {}", e);
    }
    log::info!("Presented {} frames", tick);
}
