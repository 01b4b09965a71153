//! Application configuration

use cm11a_core::config::SerialConfig;
use cm11a_core::protocol::frame::{address_frame, function_frame, Function, HouseCode};
use cm11a_core::protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What to switch, and how long to try
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial line settings
    pub serial: SerialConfig,
    /// House code of the target module
    pub house: HouseCode,
    /// Unit code of the target module (1-16)
    pub unit: u8,
    /// Function to send
    pub function: Function,
    /// Dim/bright steps (0-22), ignored for other functions
    pub dim: u8,
    /// Bound on the whole handshake
    pub deadline_secs: u64,
    /// Cap on a single readiness wait
    pub poll_interval_ms: u64,
    /// Answer time requests with the full clock frame instead of a bare 0x9B
    pub set_clock: bool,
    /// Resends allowed per frame after a checksum mismatch
    pub max_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            house: HouseCode::A,
            unit: 2,
            function: Function::On,
            dim: 0,
            deadline_secs: 30,
            poll_interval_ms: 1000,
            set_clock: false,
            max_retries: 3,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| ProtocolError::Config(e.to_string()))
    }

    /// Address and function frames for the configured target
    pub fn frames(&self) -> Result<([u8; 2], [u8; 2]), ProtocolError> {
        Ok((
            address_frame(self.house, self.unit)?,
            function_frame(self.house, self.function, self.dim)?,
        ))
    }

    /// Handshake deadline
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Per-iteration wait cap
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
