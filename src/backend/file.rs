//! File Backend - writes every presented frame to disk
//!
//! Needs no display server, so it works in CI and on every platform.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use byteorder::{LittleEndian, WriteBytesExt};

use super::*;
use crate::config::{FileConfig, ImageFileFormat, WindowOptions};
use crate::error::BackendResult;
use crate::framebuffer::Framebuffer;

/// BMP file header plus BITMAPINFOHEADER
const BMP_HEADER_LEN: u32 = 54;
/// 72 DPI in pixels per metre
const BMP_PIXELS_PER_METRE: u32 = 2835;

pub struct FileBackend {
    config: FileConfig,
    width: u32,
    height: u32,
    frame_count: u64,
    state: BackendState,
    close_flag: CloseFlag,
}

impl FileBackend {
    pub fn new(config: FileConfig, options: &WindowOptions) -> BackendResult<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        log::info!(
            "Writing {} frames to {}",
            config.format.extension(),
            config.output_dir.display()
        );
        Ok(FileBackend {
            config,
            width: options.width,
            height: options.height,
            frame_count: 0,
            state: BackendState::Ready,
            close_flag: CloseFlag::default(),
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Path the next presented frame will be written to
    pub fn next_path(&self) -> PathBuf {
        self.config.output_dir.join(format!(
            "frame_{:05}.{}",
            self.frame_count,
            self.config.format.extension()
        ))
    }
}

/// ASCII `P3` pixmap
fn write_ppm<W: Write>(out: &mut W, frame: &Framebuffer) -> std::io::Result<()> {
    writeln!(out, "P3")?;
    writeln!(out, "{} {}", frame.width(), frame.height())?;
    writeln!(out, "255")?;
    for row in frame.as_rgba().chunks_exact(frame.width().max(1) as usize * 4) {
        let line: Vec<String> = row
            .chunks_exact(4)
            .map(|px| format!("{} {} {}", px[0], px[1], px[2]))
            .collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

/// Binary `P6` pixmap
fn write_ppm_binary<W: Write>(out: &mut W, frame: &Framebuffer) -> std::io::Result<()> {
    write!(out, "P6\n{} {}\n255\n", frame.width(), frame.height())?;
    for px in frame.as_rgba().chunks_exact(4) {
        out.write_all(&px[..3])?;
    }
    Ok(())
}

/// 24-bit bottom-up BMP, rows padded to 4 bytes
fn write_bmp<W: Write>(out: &mut W, frame: &Framebuffer) -> std::io::Result<()> {
    let (width, height) = (frame.width(), frame.height());
    let row_size = (24 * width + 31) / 32 * 4;
    let pixel_data_size = row_size * height;

    out.write_all(b"BM")?;
    out.write_u32::<LittleEndian>(BMP_HEADER_LEN + pixel_data_size)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(BMP_HEADER_LEN)?;

    out.write_u32::<LittleEndian>(40)?;
    out.write_u32::<LittleEndian>(width)?;
    out.write_u32::<LittleEndian>(height)?;
    out.write_u16::<LittleEndian>(1)?; // planes
    out.write_u16::<LittleEndian>(24)?; // bits per pixel
    out.write_u32::<LittleEndian>(0)?; // uncompressed
    out.write_u32::<LittleEndian>(pixel_data_size)?;
    out.write_u32::<LittleEndian>(BMP_PIXELS_PER_METRE)?;
    out.write_u32::<LittleEndian>(BMP_PIXELS_PER_METRE)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(0)?;

    let padding = vec![0u8; (row_size - width * 3) as usize];
    for y in (0..height).rev() {
        for x in 0..width {
            let c = frame.get_pixel(x, y).unwrap_or_default();
            out.write_all(&[c.b, c.g, c.r])?;
        }
        out.write_all(&padding)?;
    }
    Ok(())
}

impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
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

        let path = self.next_path();
        let mut out = BufWriter::new(File::create(&path)?);
        match self.config.format {
            ImageFileFormat::Ppm => write_ppm(&mut out, frame)?,
            ImageFileFormat::PpmBinary => write_ppm_binary(&mut out, frame)?,
            ImageFileFormat::Bmp => write_bmp(&mut out, frame)?,
        }
        out.flush()?;
        log::debug!("Wrote {}", path.display());

        self.width = frame.width();
        self.height = frame.height();
        self.frame_count += 1;
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                self.close_flag.set();
            }
        }
        Ok(())
    }

    fn poll_events(&mut self) -> BackendResult<Vec<BackendEvent>> {
        Ok(Vec::new())
    }

    fn should_close(&self) -> bool {
        self.close_flag.get()
    }

    fn close(&mut self) -> BackendResult<()> {
        if self.state != BackendState::Closed {
            log::info!("File backend wrote {} frames", self.frame_count);
        }
        self.state = BackendState::Closed;
        self.close_flag.set();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::Color;

    fn backend(format: ImageFileFormat, max_frames: Option<u64>) -> (FileBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FileConfig::new(dir.path());
        config.format = format;
        config.max_frames = max_frames;
        let backend = FileBackend::new(config, &WindowOptions::default()).unwrap();
        (backend, dir)
    }

    #[test]
    fn test_frame_names_count_up() {
        let (mut backend, dir) = backend(ImageFileFormat::Ppm, None);
        let frame = Framebuffer::new(2, 2);
        backend.present(&frame).unwrap();
        backend.present(&frame).unwrap();
        assert!(dir.path().join("frame_00000.ppm").exists());
        assert!(dir.path().join("frame_00001.ppm").exists());
        assert_eq!(backend.frame_count(), 2);
    }

    #[test]
    fn test_ascii_ppm_layout() {
        let (mut backend, dir) = backend(ImageFileFormat::Ppm, None);
        let mut frame = Framebuffer::new(2, 1);
        frame.set_pixel(0, 0, Color::RED);
        backend.present(&frame).unwrap();
        let text = std::fs::read_to_string(dir.path().join("frame_00000.ppm")).unwrap();
        assert_eq!(text, "P3\n2 1\n255\n255 0 0 0 0 0\n");
    }

    #[test]
    fn test_bmp_rows_are_padded() {
        let mut out = Vec::new();
        write_bmp(&mut out, &Framebuffer::new(3, 2)).unwrap();
        // 9 bytes of pixels per row, padded to 12
        assert_eq!(out.len(), 54 + 12 * 2);
        assert_eq!(&out[..2], b"BM");
        assert_eq!(u32::from_le_bytes(out[2..6].try_into().unwrap()), 78);
    }

    #[test]
    fn test_max_frames_sets_should_close() {
        let (mut backend, _dir) = backend(ImageFileFormat::PpmBinary, Some(2));
        let frame = Framebuffer::new(1, 1);
        backend.present(&frame).unwrap();
        assert!(!backend.should_close());
        backend.present(&frame).unwrap();
        assert!(backend.should_close());
        // Still set after more calls
        backend.poll_events().unwrap();
        assert!(backend.should_close());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut backend, dir) = backend(ImageFileFormat::Ppm, None);
        backend.close().unwrap();
        backend.close().unwrap();
        assert_eq!(backend.state(), BackendState::Closed);
        backend.present(&Framebuffer::new(1, 1)).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
