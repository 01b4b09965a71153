//! X10 frame encoding
//!
//! Builds the two-byte address/function frames the interface transmits on the
//! power line, plus the host's single-byte replies and the interface clock
//! frame.
//!
//! Frame layout:
//! - header: `dim << 3 | 0x04 | F/A << 1 | E/S`
//! - code:   `house << 4 | unit` (address) or `house << 4 | function`

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Sent after a good checksum: "transmit it"
pub const CHECKSUM_ACK: u8 = 0x00;

/// Reply to a time request (head of the clock frame)
pub const TIME_ACK: u8 = 0x9B;

/// Highest dim level encodable in a function header
pub const MAX_DIM: u8 = 22;

/// Header bit that is always set
const HEADER_SYNC: u8 = 0x04;
/// Header bit selecting a function frame (clear for an address frame)
const HEADER_FUNCTION: u8 = 0x02;
/// Header bit selecting an extended transmission
const HEADER_EXTENDED: u8 = 0x01;

/// Nibble encoding shared by house letters A..P and unit numbers 1..16
const CODE_TABLE: [u8; 16] = [
    0x6, 0xE, 0x2, 0xA, 0x1, 0x9, 0x5, 0xD, 0x7, 0xF, 0x3, 0xB, 0x0, 0x8, 0x4, 0xC,
];

/// Checksum the interface echoes for a frame: 8-bit truncated byte sum
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// X10 house code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum HouseCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
}

impl HouseCode {
    /// Wire nibble for this house
    pub fn nibble(&self) -> u8 {
        CODE_TABLE[*self as usize]
    }

    /// House letter
    pub fn letter(&self) -> char {
        (b'A' + *self as u8) as char
    }
}

impl fmt::Display for HouseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Wire nibble for a unit number (1..=16)
pub fn unit_nibble(unit: u8) -> Result<u8, ProtocolError> {
    if !(1..=16).contains(&unit) {
        return Err(ProtocolError::InvalidFrame(format!(
            "unit {} not in 1-16",
            unit
        )));
    }
    Ok(CODE_TABLE[(unit - 1) as usize])
}

/// X10 function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Function {
    AllUnitsOff,
    AllLightsOn,
    On,
    Off,
    Dim,
    Bright,
    AllLightsOff,
    ExtendedCode,
    HailRequest,
    HailAck,
    PresetDim1,
    PresetDim2,
    ExtendedData,
    StatusOn,
    StatusOff,
    StatusRequest,
}

impl Function {
    /// Wire nibble for this function
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Whether the header's dim field is meaningful
    pub fn takes_dim(&self) -> bool {
        matches!(self, Function::Dim | Function::Bright)
    }
}

/// Address frame selecting `unit` on `house`
pub fn address_frame(house: HouseCode, unit: u8) -> Result<[u8; 2], ProtocolError> {
    let unit = unit_nibble(unit)?;
    Ok([HEADER_SYNC, house.nibble() << 4 | unit])
}

/// Function frame for every addressed unit on `house`
///
/// `dim` is only carried for dim/bright and must not exceed [`MAX_DIM`].
pub fn function_frame(house: HouseCode, function: Function, dim: u8) -> Result<[u8; 2], ProtocolError> {
    if dim > MAX_DIM {
        return Err(ProtocolError::InvalidFrame(format!(
            "dim {} exceeds {}",
            dim, MAX_DIM
        )));
    }
    let dim = if function.takes_dim() { dim } else { 0 };
    let mut header = dim << 3 | HEADER_SYNC | HEADER_FUNCTION;
    if function == Function::ExtendedCode {
        header |= HEADER_EXTENDED;
    }
    Ok([header, house.nibble() << 4 | function.code()])
}

/// Set-interface-clock frame answering a time request
///
/// Layout: `0x9B`, seconds, minutes (0-119, hour parity folded in), hours / 2,
/// year day low byte, year day bit 8 in bit 7 plus a one-hot weekday mask
/// (Sunday = bit 0), monitored house in the high nibble of the last byte.
pub fn clock_frame(now: &NaiveDateTime, monitored: HouseCode) -> [u8; 7] {
    let yday = now.ordinal0() as u16;
    let weekday = now.weekday().num_days_from_sunday() as u8;
    [
        TIME_ACK,
        now.second().min(59) as u8,
        (now.minute() + 60 * (now.hour() % 2)) as u8,
        (now.hour() / 2) as u8,
        (yday & 0xFF) as u8,
        (((yday >> 8) as u8) << 7) | (1 << weekday),
        monitored.nibble() << 4,
    ]
}
