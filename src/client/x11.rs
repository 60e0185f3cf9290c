//! X11 wire client
//!
//! One connection to an X server: handshake, resource ids, sequence numbers,
//! atom interning, and the demultiplexing of replies from events.

use std::collections::VecDeque;

use crate::backend::BackendState;
use crate::config::{DisplayAddress, X11Config};
use crate::connection::Transport;
use crate::error::{BackendError, BackendResult};
use crate::protocol::x11::*;
use crate::protocol::EncodeError;
use crate::resources::{AtomCache, X11IdAllocator};

pub struct X11Connection {
    transport: Transport,
    setup: SetupSuccess,
    screen: usize,
    ids: X11IdAllocator,
    atoms: AtomCache,
    /// Sequence number of the last request sent
    sequence: u16,
    /// Events read while waiting for a reply
    queued: VecDeque<X11Event>,
    state: BackendState,
}

impl X11Connection {
    /// Connect to the configured display and run the setup handshake.
    pub fn connect(config: &X11Config) -> BackendResult<Self> {
        let transport = match &config.address {
            DisplayAddress::Unix(path) => Transport::unix(path)?,
            DisplayAddress::Tcp { host, port } => Transport::tcp(host, *port)?,
        };
        Self::handshake(transport, config.screen)
    }

    /// Send the setup packet over an open transport and parse the reply.
    pub fn handshake(mut transport: Transport, screen: u16) -> BackendResult<Self> {
        log::debug!("X11 connection state: {}", BackendState::Connecting);
        transport.write_all(&SetupRequest::default().encode())?;

        let mut raw = [0u8; SETUP_HEADER_LEN];
        transport.read_exact(&mut raw)?;
        let header = SetupHeader::parse(&raw);

        let mut data = vec![0u8; header.additional_len()];
        transport.read_exact(&mut data)?;

        if SetupStatus::from_u8(header.status) != Some(SetupStatus::Success) {
            let failed = SetupFailed::parse(&header, &data);
            log::error!(
                "X server refused connection (status {}): {}",
                failed.status,
                failed.reason
            );
            return Err(BackendError::SetupRefused {
                status: failed.status,
                reason: failed.reason,
            });
        }

        let setup = SetupSuccess::parse(&header, &data).map_err(BackendError::SetupTruncated)?;
        let screen = screen as usize;
        if screen >= setup.roots.len() {
            return Err(BackendError::SetupTruncated(
                crate::protocol::DecodeError::Invalid("screen number"),
            ));
        }

        log::debug!("X11 setup successful:");
        log::debug!("  Resource ID base: 0x{:08x}", setup.resource_id_base);
        log::debug!("  Resource ID mask: 0x{:08x}", setup.resource_id_mask);
        log::debug!("  Vendor: {}", setup.vendor);
        log::debug!("  Screens: {}", setup.roots.len());
        log::debug!("X11 connection state: {}", BackendState::HandshakeDone);

        Ok(X11Connection {
            transport,
            ids: X11IdAllocator::new(setup.resource_id_base, setup.resource_id_mask),
            setup,
            screen,
            atoms: AtomCache::new(),
            sequence: 0,
            queued: VecDeque::new(),
            state: BackendState::HandshakeDone,
        })
    }

    /// `HandshakeDone` once set up, `Closed` after [`close`](Self::close)
    pub fn state(&self) -> BackendState {
        self.state
    }

    pub fn setup(&self) -> &SetupSuccess {
        &self.setup
    }

    /// The screen windows are created on
    pub fn screen(&self) -> &Screen {
        &self.setup.roots[self.screen]
    }

    /// Largest request the server takes, in 4-byte units
    pub fn max_request_words(&self) -> usize {
        self.setup.maximum_request_length as usize
    }

    pub fn generate_id(&mut self) -> BackendResult<u32> {
        self.ids.allocate()
    }

    /// Queue a request and return its sequence number.
    pub fn send<R: Request>(&mut self, request: &R) -> BackendResult<u16> {
        let bytes = request.encode()?;
        if bytes.len() > self.max_request_words() * 4 {
            return Err(BackendError::Encode(EncodeError::TooLarge {
                bytes: bytes.len(),
                max_bytes: self.max_request_words() * 4,
            }));
        }
        self.transport.queue(&bytes);
        self.sequence = self.sequence.wrapping_add(1);
        log::trace!(
            "Queued request {:?} ({} bytes, sequence {})",
            R::OPCODE,
            bytes.len(),
            self.sequence
        );
        Ok(self.sequence)
    }

    pub fn flush(&mut self) -> BackendResult<()> {
        self.transport.flush()
    }

    /// Atom for `name`, asking the server only the first time.
    pub fn intern_atom(&mut self, name: &str) -> BackendResult<Atom> {
        if let Some(atom) = self.atoms.get(name) {
            return Ok(atom);
        }
        if u16::try_from(name.len()).is_err() {
            return Err(BackendError::Encode(EncodeError::TooLarge {
                bytes: name.len(),
                max_bytes: u16::MAX as usize,
            }));
        }

        let sequence = self.send(&InternAtom {
            only_if_exists: false,
            name,
        })?;
        self.flush()?;

        let reply = self.wait_for_reply(sequence)?;
        let atom = parse_intern_atom_reply(&reply)?;
        log::debug!("Interned atom {} = {}", name, atom.get());
        Ok(self.atoms.insert(name, atom))
    }

    /// Block until the reply to `sequence` arrives. Events read meanwhile
    /// are queued for [`poll_event`](Self::poll_event).
    fn wait_for_reply(&mut self, sequence: u16) -> BackendResult<Vec<u8>> {
        loop {
            let (event, frame) = self.read_frame()?;
            match event {
                X11Event::Reply(header) if header.sequence == sequence => return Ok(frame),
                X11Event::Reply(header) => {
                    log::warn!("Dropping reply to unexpected sequence {}", header.sequence);
                }
                X11Event::Error(err) if err.sequence == sequence => {
                    return Err(BackendError::X11Error {
                        code: err.code,
                        sequence: err.sequence,
                        bad_value: err.bad_value,
                        major_opcode: err.major_opcode,
                    });
                }
                other => self.queued.push_back(other),
            }
        }
    }

    /// Read one frame plus any reply data that follows it.
    fn read_frame(&mut self) -> BackendResult<(X11Event, Vec<u8>)> {
        let mut frame = vec![0u8; FRAME_LEN];
        self.transport.read_exact(&mut frame)?;
        let event = X11Event::decode(&frame)?;
        if let X11Event::Reply(header) = &event {
            let extra = header.extra_len();
            if extra > 0 {
                frame.resize(FRAME_LEN + extra, 0);
                self.transport.read_exact(&mut frame[FRAME_LEN..])?;
            }
        }
        Ok((event, frame))
    }

    /// Next event if one is queued or already readable. Never blocks
    /// waiting for the server.
    pub fn poll_event(&mut self) -> BackendResult<Option<X11Event>> {
        if let Some(event) = self.queued.pop_front() {
            return Ok(Some(event));
        }
        if !self.transport.readable()? {
            return Ok(None);
        }
        let (event, _) = self.read_frame()?;
        Ok(Some(event))
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub fn close(&mut self) {
        self.transport.close();
        self.state = BackendState::Closed;
    }
}
