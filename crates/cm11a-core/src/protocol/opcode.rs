//! Inbound opcodes
//!
//! Single-byte messages the interface sends on its own initiative.

use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Opcodes sent by the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Interface finished transmitting on the power line (0x55)
    InterfaceReady,

    /// Interface has data to upload and asks the PC to collect it (0x5A)
    InterfacePoll,

    /// Interface lost its clock (power failure) and wants the time (0xA5)
    TimeRequest,
}

impl Opcode {
    /// Get the wire byte
    pub fn byte(&self) -> u8 {
        match self {
            Opcode::InterfaceReady => 0x55,
            Opcode::InterfacePoll => 0x5A,
            Opcode::TimeRequest => 0xA5,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x55 => Ok(Opcode::InterfaceReady),
            0x5A => Ok(Opcode::InterfacePoll),
            0xA5 => Ok(Opcode::TimeRequest),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bytes() {
        assert_eq!(Opcode::InterfaceReady.byte(), 0x55);
        assert_eq!(Opcode::InterfacePoll.byte(), 0x5A);
        assert_eq!(Opcode::TimeRequest.byte(), 0xA5);
    }

    #[test]
    fn test_unknown_byte_rejected() {
        for byte in [0x00u8, 0x54, 0x56, 0xC3, 0xFF] {
            assert!(matches!(
                Opcode::try_from(byte),
                Err(ProtocolError::UnknownOpcode(b)) if b == byte
            ));
        }
    }

    #[test]
    fn test_every_opcode_maps_back() {
        for op in [Opcode::InterfaceReady, Opcode::InterfacePoll, Opcode::TimeRequest] {
            assert_eq!(Opcode::try_from(op.byte()).ok(), Some(op));
        }
    }
}
