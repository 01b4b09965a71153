//! Checksummed write queue
//!
//! Holds at most one outbound frame. A frame submitted with checksum
//! verification arms [`ChecksumState`], which tells the dispatcher that the
//! next inbound byte is the interface's echo rather than an opcode.

use tracing::debug;

use super::{frame::checksum, ProtocolError, Transport};

/// Whether a submitted frame expects a checksum echo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Interface will echo the frame's checksum
    Verify,
    /// Fire and forget (acks, poll/time replies)
    None,
}

/// Pending checksum echo, if any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecksumState {
    want: bool,
    expected: u8,
}

impl ChecksumState {
    /// Whether the next inbound byte is a checksum echo
    pub fn is_armed(&self) -> bool {
        self.want
    }

    /// Value the echo must match
    pub fn expected(&self) -> u8 {
        self.expected
    }

    /// Arm for the checksum of `data`
    pub fn arm(&mut self, data: &[u8]) {
        self.expected = checksum(data);
        self.want = true;
    }

    /// Consume the echo; returns whether it matched
    ///
    /// Always disarms, match or not.
    pub fn consume(&mut self, byte: u8) -> bool {
        self.want = false;
        byte == self.expected
    }

    /// Forget any pending echo
    pub fn clear(&mut self) {
        self.want = false;
    }
}

/// Result of one drain step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainProgress {
    /// Some bytes went out, more remain
    Partial {
        /// Bytes written so far
        sent: usize,
        /// Bytes still queued
        remaining: usize,
    },
    /// The whole frame has been written and released
    Drained,
}

/// Single-slot outbound buffer with a sent offset
#[derive(Debug, Default)]
pub struct WriteQueue {
    pending: Option<Vec<u8>>,
    bytes_sent: usize,
    checksum: ChecksumState,
}

impl WriteQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `data` for transmission
    ///
    /// Fails with [`ProtocolError::AlreadyPending`] if a frame is outstanding;
    /// the outstanding frame is left untouched.
    pub fn submit(&mut self, data: &[u8], mode: ChecksumMode) -> Result<(), ProtocolError> {
        if self.pending.is_some() {
            return Err(ProtocolError::AlreadyPending);
        }
        if data.is_empty() {
            return Err(ProtocolError::InvalidFrame("empty write".to_string()));
        }
        match mode {
            ChecksumMode::Verify => self.checksum.arm(data),
            ChecksumMode::None => self.checksum.clear(),
        }
        self.pending = Some(data.to_vec());
        self.bytes_sent = 0;
        debug!(
            "queued {} byte(s) {:02X?}, checksum {:?}",
            data.len(),
            data,
            self.checksum.is_armed().then_some(self.checksum.expected())
        );
        Ok(())
    }

    /// Write as much of the unsent suffix as the transport accepts
    ///
    /// A zero-byte write or an I/O error is [`ProtocolError::TransportWriteFailed`].
    /// With nothing pending this is a no-op reporting `Drained`.
    pub fn drain_step<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<DrainProgress, ProtocolError> {
        let Some(data) = self.pending.as_ref() else {
            return Ok(DrainProgress::Drained);
        };
        let remaining = &data[self.bytes_sent..];
        let written = match transport.write_nonblocking(remaining) {
            Ok(0) => {
                return Err(ProtocolError::TransportWriteFailed(
                    "transport accepted no bytes".to_string(),
                ))
            }
            Ok(n) => n.min(remaining.len()),
            Err(e) => return Err(ProtocolError::TransportWriteFailed(e.to_string())),
        };
        self.bytes_sent += written;
        let total = data.len();
        debug!("wrote {} byte(s), {}/{}", written, self.bytes_sent, total);

        if self.bytes_sent >= total {
            self.pending = None;
            self.bytes_sent = 0;
            Ok(DrainProgress::Drained)
        } else {
            Ok(DrainProgress::Partial {
                sent: self.bytes_sent,
                remaining: total - self.bytes_sent,
            })
        }
    }

    /// Whether a frame is outstanding
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The outstanding frame
    pub fn pending(&self) -> Option<&[u8]> {
        self.pending.as_deref()
    }

    /// Bytes of the outstanding frame already written
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Checksum echo state
    pub fn checksum(&self) -> &ChecksumState {
        &self.checksum
    }

    /// Checksum echo state, mutable (for the dispatcher)
    pub fn checksum_mut(&mut self) -> &mut ChecksumState {
        &mut self.checksum
    }
}
