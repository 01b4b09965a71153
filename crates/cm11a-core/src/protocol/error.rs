//! Protocol errors

use thiserror::Error;

/// Errors that can occur while driving the interface
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A frame is still queued; one outstanding write at a time
    #[error("A write is already pending")]
    AlreadyPending,

    /// Reading from the transport failed or hit end of stream
    #[error("Transport read failed: {0}")]
    TransportReadFailed(String),

    /// Writing to the transport failed or made no progress
    #[error("Transport write failed: {0}")]
    TransportWriteFailed(String),

    /// Byte outside the opcode set while no checksum was expected
    #[error("Unknown opcode from interface: {0:#04x}")]
    UnknownOpcode(u8),

    /// Named serial device does not exist
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// The device refused a line setting
    #[error("Serial configuration rejected ({setting}): {reason}")]
    ConfigurationRejected {
        /// Setting that was refused
        setting: &'static str,
        /// Driver's reason
        reason: String,
    },

    /// Any other serial open failure
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// A handler callback gave up
    #[error("Callback aborted: {0}")]
    Callback(String),

    /// Frame could not be encoded or submitted
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Config file unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Deadline passed before the exchange finished
    #[error("Handshake timeout")]
    Timeout,

    /// Raw I/O failure, e.g. from the readiness wait
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error leaves the engine instance unusable
    ///
    /// Transport failures are fatal: there is no reconnect. Framing and
    /// callback errors end the current tick only.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::TransportReadFailed(_)
                | ProtocolError::TransportWriteFailed(_)
                | ProtocolError::IoError(_)
        )
    }
}
