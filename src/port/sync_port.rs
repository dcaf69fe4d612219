//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `SerialPortAdapter`
//! trait, and exposes `SerialportBinding` as the production `ChannelBinding`.

use super::error::PortError;
use super::traits::{ChannelBinding, FramingParams, SerialPortAdapter};
use std::io::{Read, Write};

/// Baud rate used for the initial open, before `set_params` applies the real one.
const OPEN_BAUD_RATE: u32 = 9600;

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the driver's default framing.
    ///
    /// # Example
    /// ```no_run
    /// use serial_session::port::{FramingParams, SerialPortAdapter, SyncSerialPort};
    ///
    /// let mut port = SyncSerialPort::open("/dev/ttyUSB0")?;
    /// port.set_params(&FramingParams::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str) -> Result<Self, PortError> {
        let port = serialport::new(port_name, OPEN_BAUD_RATE)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_params(&mut self, params: &FramingParams) -> Result<(), PortError> {
        // Translate first so an unsupported setting leaves the port untouched.
        let parity = serialport::Parity::try_from(params.parity)?;
        let stop_bits = serialport::StopBits::try_from(params.stop_bits)?;

        self.port.set_baud_rate(params.baud_rate)?;
        self.port.set_data_bits(params.data_bits.into())?;
        self.port.set_parity(parity)?;
        self.port.set_stop_bits(stop_bits)?;
        self.port.set_timeout(params.timeout)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        // An unplugged adapter fails the status ioctl.
        self.port.bytes_to_read().is_ok()
    }

    fn close(mut self: Box<Self>) -> Result<(), PortError> {
        let flushed = self.port.flush().map_err(PortError::Io);
        drop(self);
        flushed
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

/// `ChannelBinding` backed by the host's serial driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialportBinding;

impl SerialportBinding {
    pub fn new() -> Self {
        Self
    }
}

impl ChannelBinding for SerialportBinding {
    fn open(&self, channel_id: &str) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(channel_id)?))
    }

    fn list_channels(&self) -> Result<Vec<String>, PortError> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let result = SyncSerialPort::open("/dev/nonexistent_port_12345");

        assert!(result.is_err());
        if let Err(e) = result {
            match e {
                PortError::NotFound(name) => {
                    assert!(name.contains("nonexistent"));
                }
                PortError::Serial(_) => {}
                _ => panic!("Expected NotFound error, got: {:?}", e),
            }
        }
    }

    #[test]
    fn test_binding_open_missing_port_fails() {
        let binding = SerialportBinding::new();
        assert!(binding.open("/dev/nonexistent_port_67890").is_err());
    }
}
