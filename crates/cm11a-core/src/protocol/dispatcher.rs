//! Inbound byte dispatch
//!
//! Two states, selected by whether a checksum echo is armed: awaiting the
//! checksum, or awaiting an opcode. Exactly one byte moves the machine.

use tracing::{debug, warn};

use super::{ChecksumState, Opcode, ProtocolError};

/// What an inbound byte meant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Echo matched the frame just sent
    ChecksumOk,
    /// Echo did not match; the frame should be resent
    ChecksumNotOk {
        /// Sum of the frame just sent
        expected: u8,
        /// Byte the interface echoed
        actual: u8,
    },
    /// Unsolicited opcode from the interface
    Opcode(Opcode),
}

/// Classify one inbound byte
///
/// While a checksum is armed the byte is always consumed as the echo, and the
/// state returns to awaiting an opcode whether or not it matched. Otherwise an
/// unrecognized byte is [`ProtocolError::UnknownOpcode`].
pub fn dispatch(byte: u8, checksum: &mut ChecksumState) -> Result<Event, ProtocolError> {
    if checksum.is_armed() {
        let expected = checksum.expected();
        return if checksum.consume(byte) {
            debug!("checksum {:#04x} ok", byte);
            Ok(Event::ChecksumOk)
        } else {
            warn!("checksum mismatch: expected {:#04x}, got {:#04x}", expected, byte);
            Ok(Event::ChecksumNotOk {
                expected,
                actual: byte,
            })
        };
    }

    match Opcode::try_from(byte) {
        Ok(op) => {
            debug!("opcode {:#04x} ({:?})", op.byte(), op);
            Ok(Event::Opcode(op))
        }
        Err(e) => {
            warn!("unknown opcode {:#04x}", byte);
            Err(e)
        }
    }
}
