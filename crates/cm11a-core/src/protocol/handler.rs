//! Host callbacks
//!
//! The engine reports every protocol event to a [`Handler`]. Callbacks get a
//! [`Link`]: the slice of the engine they may touch (the write queue and the
//! host's own state). Returning `Err` ends the current tick with that error.

use super::{ChecksumMode, ProtocolError, WriteQueue};

/// Engine view handed to callbacks
///
/// `S` is the host's state. The engine stores it and passes it back here but
/// never looks inside.
pub struct Link<'a, S> {
    queue: &'a mut WriteQueue,
    user: &'a mut S,
}

impl<'a, S> Link<'a, S> {
    pub(crate) fn new(queue: &'a mut WriteQueue, user: &'a mut S) -> Self {
        Self { queue, user }
    }

    /// Queue a frame the interface will echo a checksum for
    pub fn submit_with_checksum(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.queue.submit(data, ChecksumMode::Verify)
    }

    /// Queue a frame with no checksum echo
    pub fn submit(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.queue.submit(data, ChecksumMode::None)
    }

    /// Whether a frame is still outstanding
    pub fn is_write_pending(&self) -> bool {
        self.queue.is_pending()
    }

    /// Checksum expected for the last verified frame
    pub fn expected_checksum(&self) -> u8 {
        self.queue.checksum().expected()
    }

    /// Host state
    pub fn user(&self) -> &S {
        &*self.user
    }

    /// Host state, mutable
    pub fn user_mut(&mut self) -> &mut S {
        &mut *self.user
    }
}

/// Callbacks for protocol events
///
/// Every method defaults to doing nothing, so hosts override only what they
/// care about.
#[allow(unused_variables)]
pub trait Handler<S> {
    /// Interface sent 0x55: it finished a power-line transmission
    fn interface_ready(&mut self, link: &mut Link<'_, S>) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Interface sent 0x5A: it has data to upload
    fn interface_poll(&mut self, link: &mut Link<'_, S>) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Interface sent 0xA5: it wants the time
    fn time_request(&mut self, link: &mut Link<'_, S>) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Echo matched the last verified frame
    fn checksum_ok(&mut self, link: &mut Link<'_, S>) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Echo did not match; resubmitting is up to the host
    fn checksum_not_ok(&mut self, link: &mut Link<'_, S>) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// The outstanding frame has been fully written
    fn write_drained(&mut self, link: &mut Link<'_, S>) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// Handler that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl<S> Handler<S> for NoopHandler {}
