//! Serial port handling
//!
//! Opens and configures the interface's serial line and exposes it as a
//! non-blocking [`Transport`].

use serialport::{SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;

use super::ProtocolError;
use crate::config::{self, SerialConfig};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyS0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            product: None,
        }
    }
}

/// Sort key so that:
///  - ttyACM* ports come first, then ttyUSB* (USB-serial adapters)
///  - then ttyS* (on-board UARTs)
///  - then everything else by name
///
/// Numbered ports sort numerically by suffix.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in ["ttyACM", "ttyUSB", "ttyS"].iter().enumerate() {
        if let Some(rest) = basename.strip_prefix(prefix) {
            if let Ok(num) = rest.parse::<usize>() {
                return (rank as u8, num, basename.to_string());
            }
        }
    }
    (3, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux-only: USB adapters the enumeration API missed
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

fn data_bits(bits: u8) -> Result<serialport::DataBits, ProtocolError> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(ProtocolError::ConfigurationRejected {
            setting: "data_bits",
            reason: format!("{} not in 5-8", other),
        }),
    }
}

fn stop_bits(bits: u8) -> Result<serialport::StopBits, ProtocolError> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        other => Err(ProtocolError::ConfigurationRejected {
            setting: "stop_bits",
            reason: format!("{} not 1 or 2", other),
        }),
    }
}

fn parity(p: config::Parity) -> serialport::Parity {
    match p {
        config::Parity::None => serialport::Parity::None,
        config::Parity::Odd => serialport::Parity::Odd,
        config::Parity::Even => serialport::Parity::Even,
    }
}

fn rejected(setting: &'static str) -> impl FnOnce(serialport::Error) -> ProtocolError {
    move |e| ProtocolError::ConfigurationRejected {
        setting,
        reason: e.to_string(),
    }
}

/// Apply line settings in order: baud, stop bits, parity, data bits
pub fn configure_port(
    port: &mut dyn serialport::SerialPort,
    config: &SerialConfig,
) -> Result<(), ProtocolError> {
    port.set_baud_rate(config.baud_rate)
        .map_err(rejected("baud_rate"))?;
    port.set_stop_bits(stop_bits(config.stop_bits)?)
        .map_err(rejected("stop_bits"))?;
    port.set_parity(parity(config.parity))
        .map_err(rejected("parity"))?;
    port.set_data_bits(data_bits(config.data_bits)?)
        .map_err(rejected("data_bits"))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(rejected("flow_control"))?;
    Ok(())
}

#[cfg(unix)]
pub use self::unix::SerialTransport;

#[cfg(unix)]
mod unix {
    use serialport::TTYPort;
    use std::io::{self, Read, Write};
    use std::os::unix::io::AsRawFd;
    use std::time::Duration;
    use tracing::{debug, info};

    use super::{configure_port, ProtocolError};
    use crate::config::SerialConfig;
    use crate::protocol::Transport;
    use crate::reactor::{self, WaitHandle};

    /// Serial line to the interface, read and written without blocking
    pub struct SerialTransport {
        port: TTYPort,
        name: String,
    }

    impl SerialTransport {
        /// Open and configure the port
        ///
        /// Either every setting is applied or no transport is returned; a
        /// partially configured port is closed on the way out.
        pub fn open(config: &SerialConfig) -> Result<Self, ProtocolError> {
            info!(
                "opening {} at {} baud",
                config.port_name, config.baud_rate
            );
            let mut port = serialport::new(&config.port_name, config.baud_rate)
                .timeout(Duration::ZERO)
                .open_native()
                .map_err(|e| match e.kind() {
                    serialport::ErrorKind::NoDevice
                    | serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
                        ProtocolError::PortNotFound(config.port_name.clone())
                    }
                    _ => ProtocolError::SerialError(e.to_string()),
                })?;
            configure_port(&mut port, config)?;
            debug!("{} configured, fd {}", config.port_name, port.as_raw_fd());

            Ok(Self {
                port,
                name: config.port_name.clone(),
            })
        }

        /// Port name
        pub fn name(&self) -> &str {
            &self.name
        }
    }

    fn would_block(e: &io::Error) -> bool {
        matches!(
            e.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        )
    }

    impl Transport for SerialTransport {
        fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.port.read(buf) {
                Err(e) if would_block(&e) => Ok(0),
                other => other,
            }
        }

        fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.port.write(buf) {
                Err(e) if would_block(&e) => Ok(0),
                other => other,
            }
        }

        fn wait_handle(&self) -> WaitHandle {
            WaitHandle::from(self.port.as_raw_fd())
        }

        fn poll_writable(&mut self) -> io::Result<bool> {
            reactor::is_writable_now(self.wait_handle())
        }
    }

    impl Drop for SerialTransport {
        fn drop(&mut self) {
            info!("closing {}", self.name);
        }
    }
}
