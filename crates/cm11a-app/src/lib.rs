//! # x10-switch
//!
//! Host application for the cm11a engine: switches one X10 module by sending
//! its address frame, then a function frame, through a CM11A interface.

pub mod config;
pub mod session;

use std::io;
use std::time::{Duration, Instant};

use cm11a_core::protocol::{Engine, PortInfo, ProtocolError, Transport};
use cm11a_core::reactor::{Readiness, WaitObjects};
use tracing::{debug, info};

pub use config::AppConfig;
pub use session::{SwitchHandler, SwitchSession, SwitchState};

/// One line per port for `--list-ports`
pub fn describe_port(port: &PortInfo) -> String {
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => format!(
            "{} [{:04x}:{:04x}] {}",
            port.name,
            vid,
            pid,
            port.product.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string(),
        _ => port.name.clone(),
    }
}

/// Drive `engine` until the session is done, using `poll(2)` for the waits
#[cfg(unix)]
pub fn run<T: Transport>(
    engine: &mut Engine<T, SwitchSession>,
    config: &AppConfig,
) -> Result<SwitchState, ProtocolError> {
    run_with(engine, config, |objs, cap| {
        cm11a_core::reactor::wait(objs, Some(cap))
    })
}

/// Drive `engine` until the session is done
///
/// `wait` performs the readiness wait for the registered handles, bounded by
/// the given duration. The loop ends at [`SwitchState::Done`], on the first
/// tick error, or with [`ProtocolError::Timeout`] once the configured deadline
/// passes.
pub fn run_with<T, W>(
    engine: &mut Engine<T, SwitchSession>,
    config: &AppConfig,
    mut wait: W,
) -> Result<SwitchState, ProtocolError>
where
    T: Transport,
    W: FnMut(&WaitObjects, Duration) -> io::Result<Readiness>,
{
    let deadline = Instant::now() + config.deadline();
    let cap = config.poll_interval();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ProtocolError::Timeout);
        }

        let mut objs = WaitObjects::new();
        engine.get_wait_objects(&mut objs);
        let ready = wait(&objs, cap.min(remaining))?;
        debug!("wait returned, ready: {:?}", ready);

        engine.check_wait_objects(&ready)?;

        let idle = !engine.is_write_pending() && !engine.want_checksum() && !engine.user().is_busy();
        if engine.user().state == SwitchState::Start && idle {
            let address = engine.user().address();
            info!("sending address {:02X?}", address);
            engine.submit_with_checksum(&address)?;
            engine.user_mut().address_sent();
        }
        if engine.user().is_done() {
            return Ok(SwitchState::Done);
        }
    }
}
