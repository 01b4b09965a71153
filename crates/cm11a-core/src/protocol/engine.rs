//! Protocol engine
//!
//! Ties the transport, write queue, dispatcher and host callbacks together
//! behind two entry points the host loop calls in turn:
//! [`Engine::get_wait_objects`] before its readiness wait and
//! [`Engine::check_wait_objects`] after it.

use tracing::{debug, info};

use super::{
    dispatch, ChecksumMode, DrainProgress, Event, Handler, Link, NoopHandler, Opcode,
    ProtocolError, Transport, WriteQueue,
};
use crate::reactor::{Readiness, WaitObjects};

/// Non-blocking CM11A protocol engine
///
/// `T` is the transport, `S` the host's state machine. The engine owns both
/// but never interprets `S`; it is handed back to callbacks through [`Link`].
pub struct Engine<T: Transport, S> {
    /// Transport, released when the engine is dropped
    transport: T,
    /// Single-slot outbound queue and checksum state
    queue: WriteQueue,
    /// Host state
    user: S,
    /// Host callbacks
    handler: Box<dyn Handler<S>>,
    /// Metrics: cumulative bytes received & sent
    rx_bytes: u64,
    tx_bytes: u64,
}

impl<T: Transport, S> Engine<T, S> {
    /// Create an engine with no-op callbacks
    pub fn new(transport: T, user: S) -> Self {
        Self::with_handler(transport, user, NoopHandler)
    }

    /// Create an engine with host callbacks
    pub fn with_handler(transport: T, user: S, handler: impl Handler<S> + 'static) -> Self {
        info!("engine created on handle {:?}", transport.wait_handle());
        Self {
            transport,
            queue: WriteQueue::new(),
            user,
            handler: Box::new(handler),
            rx_bytes: 0,
            tx_bytes: 0,
        }
    }

    /// Replace the callbacks (before the first tick)
    pub fn set_handler(&mut self, handler: impl Handler<S> + 'static) {
        self.handler = Box::new(handler);
    }

    /// Queue a frame the interface will echo a checksum for
    pub fn submit_with_checksum(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.queue.submit(data, ChecksumMode::Verify)
    }

    /// Queue a frame with no checksum echo
    pub fn submit(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.queue.submit(data, ChecksumMode::None)
    }

    /// Register interest with the host loop
    ///
    /// Read interest is unconditional. Write interest is registered only while
    /// a frame is pending, so the host never spins on an idle writable port.
    /// The timeout hint is left as the host set it.
    pub fn get_wait_objects(&self, objs: &mut WaitObjects) {
        let handle = self.transport.wait_handle();
        objs.add_read(handle);
        if self.queue.is_pending() {
            objs.add_write(handle);
        }
    }

    /// Run one tick against the readiness the host observed
    ///
    /// If readable, exactly one byte is read and dispatched. Then, unless
    /// that failed, one drain step runs if a frame is pending and the port is
    /// writable. A frame submitted by a callback during this tick was not
    /// part of the host's wait, so the transport is probed for writability
    /// instead.
    pub fn check_wait_objects(&mut self, ready: &Readiness) -> Result<(), ProtocolError> {
        let handle = self.transport.wait_handle();
        let was_pending = self.queue.is_pending();

        if ready.is_readable(handle) {
            let mut buf = [0u8; 1];
            match self.transport.read_nonblocking(&mut buf) {
                Ok(1) => {
                    self.rx_bytes += 1;
                    self.feed_byte(buf[0])?;
                }
                Ok(_) => {
                    return Err(ProtocolError::TransportReadFailed(
                        "readable handle returned no data".to_string(),
                    ))
                }
                Err(e) => return Err(ProtocolError::TransportReadFailed(e.to_string())),
            }
        }

        if self.queue.is_pending() {
            let writable = if was_pending {
                ready.is_writable(handle)
            } else {
                self.transport
                    .poll_writable()
                    .map_err(|e| ProtocolError::TransportWriteFailed(e.to_string()))?
            };
            if writable {
                self.drain_step()?;
            }
        }
        Ok(())
    }

    /// Dispatch one inbound byte to the callbacks
    pub fn feed_byte(&mut self, byte: u8) -> Result<(), ProtocolError> {
        let event = dispatch(byte, self.queue.checksum_mut())?;
        let mut link = Link::new(&mut self.queue, &mut self.user);
        match event {
            Event::ChecksumOk => self.handler.checksum_ok(&mut link),
            Event::ChecksumNotOk { .. } => self.handler.checksum_not_ok(&mut link),
            Event::Opcode(Opcode::InterfaceReady) => self.handler.interface_ready(&mut link),
            Event::Opcode(Opcode::InterfacePoll) => self.handler.interface_poll(&mut link),
            Event::Opcode(Opcode::TimeRequest) => self.handler.time_request(&mut link),
        }
    }

    /// Write the next chunk of the pending frame
    ///
    /// Fires the write-drained callback once the frame is fully out.
    pub fn drain_step(&mut self) -> Result<DrainProgress, ProtocolError> {
        let before = self.queue.pending().map(<[u8]>::len).unwrap_or(0) - self.queue.bytes_sent();
        let progress = self.queue.drain_step(&mut self.transport)?;
        let after = match progress {
            DrainProgress::Partial { remaining, .. } => remaining,
            DrainProgress::Drained => 0,
        };
        self.tx_bytes += (before - after) as u64;

        if progress == DrainProgress::Drained && before > 0 {
            debug!("write drained");
            let mut link = Link::new(&mut self.queue, &mut self.user);
            self.handler.write_drained(&mut link)?;
        }
        Ok(progress)
    }

    /// Whether a frame is outstanding
    pub fn is_write_pending(&self) -> bool {
        self.queue.is_pending()
    }

    /// The outstanding frame, if any
    pub fn pending_write(&self) -> Option<&[u8]> {
        self.queue.pending()
    }

    /// Bytes of the outstanding frame already written
    pub fn bytes_sent(&self) -> usize {
        self.queue.bytes_sent()
    }

    /// Whether the next inbound byte is a checksum echo
    pub fn want_checksum(&self) -> bool {
        self.queue.checksum().is_armed()
    }

    /// Checksum the next echo must match
    pub fn expected_checksum(&self) -> u8 {
        self.queue.checksum().expected()
    }

    /// Get cumulative rx/tx byte counters
    pub fn get_counters(&self) -> (u64, u64) {
        (self.rx_bytes, self.tx_bytes)
    }

    /// Host state
    pub fn user(&self) -> &S {
        &self.user
    }

    /// Host state, mutable
    pub fn user_mut(&mut self) -> &mut S {
        &mut self.user
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Tear down: release the transport and hand back the host state
    pub fn close(self) -> S {
        info!(
            "engine closed (rx {} bytes, tx {} bytes)",
            self.rx_bytes, self.tx_bytes
        );
        self.user
    }
}
