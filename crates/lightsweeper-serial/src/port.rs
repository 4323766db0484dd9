use std::io::{self, Read, Write};

use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{ChannelError, Result};
use crate::link::{LinkConfig, SerialLink};
use crate::traits::Channel;

/// A [`Channel`] backed by an operating-system serial port.
///
/// Tiles talk 8N1 at the configured baud rate. Read timeouts surface as
/// `Ok(0)` so callers can treat silence as "no response".
pub struct SerialPortChannel {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialPortChannel {
    /// Open `name` with the baud rate and read timeout from `config`.
    pub fn open(name: &str, config: &LinkConfig) -> Result<Self> {
        let port = serialport::new(name, config.baud_rate)
            .timeout(config.read_timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open()
            .map_err(|source| ChannelError::Unavailable {
                port: name.to_string(),
                source,
            })?;

        info!(port = name, baud = config.baud_rate, "opened serial port");

        Ok(Self {
            name: name.to_string(),
            port,
        })
    }
}

impl Channel for SerialPortChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.port.write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn available(&mut self) -> io::Result<Option<usize>> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(Some(pending as usize))
    }
}

impl std::fmt::Debug for SerialPortChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortChannel")
            .field("name", &self.name)
            .finish()
    }
}

/// List the serial ports the operating system knows about.
///
/// The result is a snapshot; ports plugged in afterwards need another call.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(ChannelError::Enumerate)?;
    let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    debug!(count = names.len(), "enumerated serial ports");
    Ok(names)
}

/// Open a port and wrap it in a shareable [`SerialLink`].
pub fn open_link(name: &str, config: LinkConfig) -> Result<SerialLink> {
    let channel = SerialPortChannel::open(name, &config)?;
    Ok(SerialLink::new(Box::new(channel), config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_port_is_unavailable() {
        let result = SerialPortChannel::open("/dev/lightsweeper-does-not-exist", &LinkConfig::default());
        match result {
            Err(ChannelError::Unavailable { port, .. }) => {
                assert_eq!(port, "/dev/lightsweeper-does-not-exist");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }
}
