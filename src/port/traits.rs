//! Core traits for the channel binding.
//!
//! A `ChannelBinding` opens handles by identifier and enumerates devices; a
//! `SerialPortAdapter` is one opened handle. Both real serial ports and the
//! mock implementation plug in through these traits.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Electrical and framing parameters applied to a freshly opened handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramingParams {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Timeout for a single blocking read or write.
    pub timeout: Duration,
}

impl Default for FramingParams {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = u8;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(other),
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl TryFrom<Parity> for serialport::Parity {
    type Error = PortError;

    fn try_from(parity: Parity) -> Result<Self, Self::Error> {
        match parity {
            Parity::None => Ok(serialport::Parity::None),
            Parity::Even => Ok(serialport::Parity::Even),
            Parity::Odd => Ok(serialport::Parity::Odd),
            Parity::Mark | Parity::Space => {
                Err(PortError::unsupported(format!("{parity:?} parity")))
            }
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

impl TryFrom<StopBits> for serialport::StopBits {
    type Error = PortError;

    fn try_from(bits: StopBits) -> Result<Self, Self::Error> {
        match bits {
            StopBits::One => Ok(serialport::StopBits::One),
            StopBits::Two => Ok(serialport::StopBits::Two),
            StopBits::OnePointFive => Err(PortError::unsupported("1.5 stop bits")),
        }
    }
}

/// One opened handle on a serial channel.
///
/// Every call may block for up to the configured I/O timeout. Callers are
/// expected to serialize access; implementations need not be `Sync`.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Apply baud rate, framing and timeout to the handle.
    fn set_params(&mut self, params: &FramingParams) -> Result<(), PortError>;

    /// Whether the driver still considers the handle usable.
    fn is_open(&self) -> bool {
        true
    }

    /// Release the handle.
    fn close(self: Box<Self>) -> Result<(), PortError>;
}

/// Opens channels by identifier and lists the ones present on the host.
pub trait ChannelBinding: Send + Sync {
    /// Open the channel. Parameters are applied separately via `set_params`.
    fn open(&self, channel_id: &str) -> Result<Box<dyn SerialPortAdapter>, PortError>;

    /// Identifiers of the channels currently available.
    fn list_channels(&self) -> Result<Vec<String>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = FramingParams::default();
        assert_eq!(params.baud_rate, 115_200);
        assert_eq!(params.data_bits, DataBits::Eight);
        assert_eq!(params.parity, Parity::None);
        assert_eq!(params.stop_bits, StopBits::One);
        assert_eq!(params.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_data_bits_conversion() {
        let serialport_bits: serialport::DataBits = DataBits::Seven.into();
        assert_eq!(serialport_bits, serialport::DataBits::Seven);
        assert_eq!(DataBits::try_from(5u8), Ok(DataBits::Five));
        assert_eq!(DataBits::try_from(9u8), Err(9));
    }

    #[test]
    fn test_parity_conversion() {
        let even: serialport::Parity = Parity::Even.try_into().unwrap();
        assert_eq!(even, serialport::Parity::Even);

        let mark: Result<serialport::Parity, _> = Parity::Mark.try_into();
        assert!(matches!(mark, Err(PortError::Unsupported(_))));
        let space: Result<serialport::Parity, _> = Parity::Space.try_into();
        assert!(space.is_err());
    }

    #[test]
    fn test_stop_bits_conversion() {
        let two: serialport::StopBits = StopBits::Two.try_into().unwrap();
        assert_eq!(two, serialport::StopBits::Two);

        let one_half: Result<serialport::StopBits, _> = StopBits::OnePointFive.try_into();
        assert!(matches!(one_half, Err(PortError::Unsupported(_))));
    }

    #[test]
    fn test_enum_serde_names() {
        let json = serde_json::to_string(&StopBits::OnePointFive).unwrap();
        assert_eq!(json, "\"one_point_five\"");
        let parity: Parity = serde_json::from_str("\"space\"").unwrap();
        assert_eq!(parity, Parity::Space);
    }
}
