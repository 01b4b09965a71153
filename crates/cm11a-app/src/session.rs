//! Switch session: address, then command, then done
//!
//! Each frame goes out with a checksum. A good echo is acknowledged with
//! 0x00, after which the interface transmits on the power line and reports
//! 0x55 when finished; that report moves the session forward.

use cm11a_core::protocol::frame::{clock_frame, HouseCode, CHECKSUM_ACK, TIME_ACK};
use cm11a_core::protocol::{Handler, Link, ProtocolError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AppConfig;

/// Where the session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchState {
    /// Nothing sent yet
    Start,
    /// Address frame sent, waiting for the interface to finish it
    SentAddress,
    /// Function frame sent, waiting for the interface to finish it
    SentCommand,
    /// Module switched
    Done,
}

/// Host state carried through the engine
#[derive(Debug, Clone)]
pub struct SwitchSession {
    /// Current state
    pub state: SwitchState,
    address: [u8; 2],
    command: [u8; 2],
    /// Frame the next checksum echo belongs to
    last_frame: Option<Vec<u8>>,
    retries: u32,
    max_retries: u32,
    set_clock: bool,
    monitored: HouseCode,
    /// A clock frame is in flight; its interface-ready is not ours
    clock_in_flight: bool,
}

impl SwitchSession {
    /// Build a session for the configured target
    pub fn new(config: &AppConfig) -> Result<Self, ProtocolError> {
        let (address, command) = config.frames()?;
        Ok(Self {
            state: SwitchState::Start,
            address,
            command,
            last_frame: None,
            retries: 0,
            max_retries: config.max_retries,
            set_clock: config.set_clock,
            monitored: config.house,
            clock_in_flight: false,
        })
    }

    /// Address frame
    pub fn address(&self) -> [u8; 2] {
        self.address
    }

    /// Whether the session has reached its terminal state
    pub fn is_done(&self) -> bool {
        self.state == SwitchState::Done
    }

    /// Whether an unrelated exchange (clock set) is still in progress
    pub fn is_busy(&self) -> bool {
        self.clock_in_flight
    }

    /// Record that the address frame has been queued
    pub fn address_sent(&mut self) {
        self.last_frame = Some(self.address.to_vec());
        self.retries = 0;
        self.state = SwitchState::SentAddress;
    }
}

/// Callbacks driving a [`SwitchSession`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SwitchHandler;

impl Handler<SwitchSession> for SwitchHandler {
    fn interface_ready(&mut self, link: &mut Link<'_, SwitchSession>) -> Result<(), ProtocolError> {
        if link.user().clock_in_flight {
            debug!("interface ready after clock set");
            link.user_mut().clock_in_flight = false;
            return Ok(());
        }
        match link.user().state {
            SwitchState::SentAddress => {
                let command = link.user().command;
                link.submit_with_checksum(&command)?;
                let session = link.user_mut();
                session.last_frame = Some(command.to_vec());
                session.retries = 0;
                session.state = SwitchState::SentCommand;
                info!("address done, sent command {:02X?}", command);
            }
            SwitchState::SentCommand => {
                link.user_mut().state = SwitchState::Done;
                info!("command done");
            }
            state => debug!("interface ready in {:?}", state),
        }
        Ok(())
    }

    fn interface_poll(&mut self, _link: &mut Link<'_, SwitchSession>) -> Result<(), ProtocolError> {
        // Upload not collected; the interface keeps polling and gives up.
        debug!("interface poll ignored");
        Ok(())
    }

    fn time_request(&mut self, link: &mut Link<'_, SwitchSession>) -> Result<(), ProtocolError> {
        if link.is_write_pending() {
            warn!("time request while a write is pending, ignoring");
            return Ok(());
        }
        if link.user().set_clock {
            let now = chrono::Local::now().naive_local();
            let frame = clock_frame(&now, link.user().monitored);
            link.submit_with_checksum(&frame)?;
            let session = link.user_mut();
            session.last_frame = Some(frame.to_vec());
            session.retries = 0;
            session.clock_in_flight = true;
            info!("time request, setting interface clock to {}", now);
        } else {
            link.submit(&[TIME_ACK])?;
            info!("time request, acknowledged");
        }
        Ok(())
    }

    fn checksum_ok(&mut self, link: &mut Link<'_, SwitchSession>) -> Result<(), ProtocolError> {
        debug!("checksum ok, acknowledging");
        link.user_mut().last_frame = None;
        link.submit(&[CHECKSUM_ACK])
    }

    fn checksum_not_ok(&mut self, link: &mut Link<'_, SwitchSession>) -> Result<(), ProtocolError> {
        let session = link.user_mut();
        let Some(frame) = session.last_frame.clone() else {
            warn!("checksum mismatch with no frame to resend");
            return Ok(());
        };
        if session.retries >= session.max_retries {
            return Err(ProtocolError::Callback(format!(
                "checksum mismatch after {} retries",
                session.retries
            )));
        }
        session.retries += 1;
        let attempt = session.retries;
        warn!("checksum mismatch, resending {:02X?} (retry {})", frame, attempt);
        link.submit_with_checksum(&frame)
    }

    fn write_drained(&mut self, link: &mut Link<'_, SwitchSession>) -> Result<(), ProtocolError> {
        debug!("write drained in {:?}", link.user().state);
        Ok(())
    }
}
