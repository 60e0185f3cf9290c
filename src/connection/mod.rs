//! Connection layer
//!
//! This module owns the socket to a display server, via TCP or a Unix-domain
//! socket. Writes are queued and go out on [`Transport::flush`]; reads are
//! blocking and exact.

use std::io::{self, IoSlice, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::socket::{sendmsg, ControlMessage, MsgFlags};

use crate::error::{BackendError, BackendResult};

/// Underlying socket
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Stream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Stream::Tcp(stream) => stream.as_fd(),
            Stream::Unix(stream) => stream.as_fd(),
        }
    }
}

/// A connected display-server socket with an outgoing request queue
#[derive(Debug)]
pub struct Transport {
    stream: Stream,
    pending: Vec<u8>,
    closed: bool,
}

impl Transport {
    pub fn new(stream: Stream) -> Self {
        Transport {
            stream,
            pending: Vec::new(),
            closed: false,
        }
    }

    /// Connect to a Unix-domain socket
    pub fn unix(path: &Path) -> BackendResult<Self> {
        let stream = UnixStream::connect(path)?;
        log::debug!("Connected to {}", path.display());
        Ok(Transport::new(Stream::Unix(stream)))
    }

    /// Connect over TCP
    pub fn tcp(host: &str, port: u16) -> BackendResult<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        log::debug!("Connected to {}:{}", host, port);
        Ok(Transport::new(Stream::Tcp(stream)))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queue bytes for the next flush
    pub fn queue(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Number of queued bytes not yet written
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Write queued bytes to the socket
    pub fn flush(&mut self) -> BackendResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        self.write_all(&pending)
    }

    /// Write directly, bypassing the queue. Callers flush first when
    /// ordering matters.
    pub fn write_all(&mut self, bytes: &[u8]) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Disconnected);
        }
        let result = match &mut self.stream {
            Stream::Tcp(stream) => stream.write_all(bytes).and_then(|_| stream.flush()),
            Stream::Unix(stream) => stream.write_all(bytes).and_then(|_| stream.flush()),
        };
        result.map_err(map_io)
    }

    /// Fill `buf` completely. A peer hang-up becomes [`BackendError::Disconnected`].
    pub fn read_exact(&mut self, buf: &mut [u8]) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Disconnected);
        }
        let result = match &mut self.stream {
            Stream::Tcp(stream) => stream.read_exact(buf),
            Stream::Unix(stream) => stream.read_exact(buf),
        };
        result.map_err(map_io)
    }

    /// Whether a read would not block. Never waits.
    pub fn readable(&self) -> BackendResult<bool> {
        self.poll_readable(PollTimeout::ZERO)
    }

    /// Wait up to `timeout` for the socket to become readable.
    pub fn wait_readable(&self, timeout: Duration) -> BackendResult<bool> {
        let millis = timeout.as_millis().min(u128::from(u16::MAX)) as u16;
        self.poll_readable(PollTimeout::from(millis))
    }

    fn poll_readable(&self, timeout: PollTimeout) -> BackendResult<bool> {
        let mut fds = [PollFd::new(self.stream.as_fd(), PollFlags::POLLIN)];
        let ready = poll(&mut fds, timeout)?;
        if ready == 0 {
            return Ok(false);
        }
        // A hang-up counts as readable so the next read reports it
        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        Ok(revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR))
    }

    /// Send `bytes` with `fd` attached as SCM_RIGHTS. Anything queued is
    /// flushed first so the message lands in order.
    pub fn send_with_fd(&mut self, bytes: &[u8], fd: BorrowedFd<'_>) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Disconnected);
        }
        self.flush()?;
        let socket = match &self.stream {
            Stream::Unix(stream) => stream.as_raw_fd(),
            Stream::Tcp(_) => {
                return Err(BackendError::Io(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "file descriptors can only be passed over Unix sockets",
                )))
            }
        };

        let fds = [fd.as_raw_fd()];
        let cmsgs = [ControlMessage::ScmRights(&fds)];
        let iov = [IoSlice::new(bytes)];
        let sent = sendmsg::<()>(socket, &iov, &cmsgs, MsgFlags::empty(), None)?;
        if sent < bytes.len() {
            // The descriptor went with the first chunk
            self.write_all(&bytes[sent..])?;
        }
        log::trace!("Sent {} bytes with fd {}", bytes.len(), fds[0]);
        Ok(())
    }

    /// Shut the socket down in both directions so the peer sees the
    /// hang-up right away. The descriptor itself is released on drop;
    /// until then reads and writes report [`BackendError::Disconnected`].
    /// Later calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        let _ = match &self.stream {
            Stream::Tcp(stream) => stream.shutdown(std::net::Shutdown::Both),
            Stream::Unix(stream) => stream.shutdown(std::net::Shutdown::Both),
        };
    }
}

fn map_io(err: io::Error) -> BackendError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset => BackendError::Disconnected,
        _ => BackendError::Io(err),
    }
}
