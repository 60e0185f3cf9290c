//! Shared-memory pixel storage
//!
//! A frame is handed to the compositor through an unlinked file whose
//! descriptor is passed over the socket. The file lives in `/dev/shm` when
//! that is usable and in an anonymous temporary file otherwise. Frames are
//! written with a seek and a single write; nothing is mapped on this side.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::protocol::wayland::ObjectId;

/// Default directory for shared-memory files
pub const SHM_DIR: &str = "/dev/shm";

/// Bytes per ARGB8888 pixel
pub const BYTES_PER_PIXEL: usize = 4;

static NEXT_NAME: AtomicU32 = AtomicU32::new(0);

/// An unlinked, sized file backing a pool
#[derive(Debug)]
pub struct ShmFile {
    file: File,
    size: usize,
}

impl ShmFile {
    /// Create a file of `size` bytes in [`SHM_DIR`].
    pub fn create(size: usize) -> io::Result<Self> {
        Self::create_in(Path::new(SHM_DIR), size)
    }

    /// Create a file of `size` bytes in `dir`, falling back once to an
    /// anonymous temporary file if `dir` cannot hold a fresh name.
    pub fn create_in(dir: &Path, size: usize) -> io::Result<Self> {
        let file = match open_unlinked(dir) {
            Ok(file) => file,
            Err(e) => {
                log::warn!(
                    "Cannot create shm file in {} ({}), using a temporary file",
                    dir.display(),
                    e
                );
                tempfile::tempfile()?
            }
        };
        file.set_len(size as u64)?;
        Ok(ShmFile { file, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Overwrite the file from offset 0.
    pub fn write_frame(&mut self, data: &[u8]) -> io::Result<()> {
        if data.len() > self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes exceeds pool of {}", data.len(), self.size),
            ));
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Read the whole file back through the same descriptor.
    pub fn contents(&self) -> io::Result<Vec<u8>> {
        let mut data = vec![0u8; self.size];
        self.file.read_exact_at(&mut data, 0)?;
        Ok(data)
    }

    pub fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

fn open_unlinked(dir: &Path) -> io::Result<File> {
    let path = unique_path(dir);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&path)?;
    // The descriptor keeps the storage alive
    let unlinked = std::fs::remove_file(&path);
    Ok(keep_unlinked(file, &path, unlinked))
}

/// A failed unlink leaves the name behind; the descriptor is still usable.
fn keep_unlinked(file: File, path: &Path, unlinked: io::Result<()>) -> File {
    match unlinked {
        Ok(()) => log::trace!("Created shm file {}", path.display()),
        Err(e) => log::warn!("Could not unlink shm file {}: {}", path.display(), e),
    }
    file
}

fn unique_path(dir: &Path) -> PathBuf {
    let n = NEXT_NAME.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("framewire-{}-{}", std::process::id(), n))
}

/// A compositor-side buffer together with the pool and file behind it
#[derive(Debug)]
pub struct ShmBuffer {
    pub file: ShmFile,
    pub pool: ObjectId,
    pub buffer: ObjectId,
    pub width: u32,
    pub height: u32,
}

impl ShmBuffer {
    /// Pool size for a `width` x `height` frame
    pub fn size_for(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    pub fn stride(&self) -> u32 {
        self.width * BYTES_PER_PIXEL as u32
    }

    pub fn size(&self) -> usize {
        self.file.size()
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_frame(data)
    }
}
