//! # cm11a Core Library
//!
//! Non-blocking protocol engine for CM11A-style X10 power-line interfaces.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A single-byte protocol dispatcher for the interface's inbound opcodes
//! - A checksum-gated write queue (one outstanding frame at a time)
//! - Wait-object registration for an externally owned event loop
//! - Serial transport setup on top of the `serialport` crate
//! - X10 address/function/clock frame encoding
//!
//! The engine never blocks. The host owns the loop: it asks the engine which
//! handles to watch, performs the readiness wait itself, then hands the result
//! back to [`protocol::Engine::check_wait_objects`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use cm11a_core::prelude::*;
//!
//! let transport = SerialTransport::open(&SerialConfig::default())?;
//! let mut engine = Engine::new(transport, ());
//! engine.submit_with_checksum(&address_frame(HouseCode::A, 2)?)?;
//!
//! loop {
//!     let mut objs = WaitObjects::default();
//!     engine.get_wait_objects(&mut objs);
//!     let ready = reactor::wait(&objs, None)?;
//!     engine.check_wait_objects(&ready)?;
//! }
//! ```

pub mod config;
pub mod protocol;
pub mod reactor;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SerialConfig;
    pub use crate::protocol::frame::{address_frame, function_frame, Function, HouseCode};
    pub use crate::protocol::{
        Engine, Handler, Link, NoopHandler, Opcode, ProtocolError, Transport,
    };
    #[cfg(unix)]
    pub use crate::protocol::SerialTransport;
    pub use crate::reactor::{self, Readiness, WaitHandle, WaitObjects};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
