//! CM11A Serial Protocol
//!
//! Implements the byte-oriented handshake spoken by CM11A-style X10 interfaces.
//!
//! Every outbound frame is acknowledged by the interface echoing the low 8 bits
//! of the sum of its bytes. Everything else the interface sends is a single
//! opcode byte.

mod dispatcher;
mod engine;
mod error;
pub mod frame;
mod handler;
mod opcode;
pub mod serial;
mod transport;
mod write_queue;

pub use dispatcher::{dispatch, Event};
pub use engine::Engine;
pub use error::ProtocolError;
pub use frame::checksum;
pub use handler::{Handler, Link, NoopHandler};
pub use opcode::Opcode;
pub use serial::{list_ports, PortInfo};
#[cfg(unix)]
pub use serial::SerialTransport;
pub use transport::Transport;
pub use write_queue::{ChecksumMode, ChecksumState, DrainProgress, WriteQueue};

/// Default baud rate for CM11A interfaces
pub const DEFAULT_BAUD_RATE: u32 = 4800;

/// Default serial device
pub const DEFAULT_PORT: &str = "/dev/ttyS0";
