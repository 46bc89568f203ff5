//! Real serial device support.
//!
//! [`SerialConnection`] owns the open port for as long as it lives; dropping
//! it closes the device.  Lines are read through a [`BufReader`] so that
//! bytes already pulled off the wire but not yet consumed still count as
//! available on the next poll.

use std::io::{self, BufRead, BufReader, Read};
use std::time::Duration;

use sensorbridge_types::BridgeError;
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::source::{PacketSource, MAX_PACKET_BYTES};

/// Settings used to open a [`SerialConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    /// How long a single read may wait for the rest of a line.
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(1000),
        }
    }
}

/// Summary of a port found on the host, for the startup log.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSummary {
    pub port_name: String,
    pub port_type: String,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortSummary {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, product) = match info.port_type {
            SerialPortType::UsbPort(usb) => ("USB".to_string(), usb.product),
            SerialPortType::PciPort => ("PCI".to_string(), None),
            SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None),
            SerialPortType::Unknown => ("Unknown".to_string(), None),
        };
        Self {
            port_name: info.port_name,
            port_type,
            product,
        }
    }
}

impl std::fmt::Display for PortSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.product {
            Some(product) => write!(f, "{} ({}, {})", self.port_name, self.port_type, product),
            None => write!(f, "{} ({})", self.port_name, self.port_type),
        }
    }
}

/// Enumerate the serial ports present on this host.
///
/// Enumeration failures yield an empty list; the result is informational
/// only and never used to pick a port.
pub fn list_ports() -> Vec<PortSummary> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortSummary::from)
        .collect()
}

/// An open serial device (8N1, no flow control).
pub struct SerialConnection {
    settings: SerialSettings,
    reader: BufReader<Box<dyn SerialPort>>,
}

impl SerialConnection {
    /// Open the device described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SerialOpen`] if the device cannot be opened.
    /// There is no retry.
    pub fn open(settings: &SerialSettings) -> Result<Self, BridgeError> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| BridgeError::SerialOpen {
                port: settings.port.clone(),
                details: e.to_string(),
            })?;

        info!(port = %settings.port, baud_rate = settings.baud_rate, "serial port opened");
        Ok(Self {
            settings: settings.clone(),
            reader: BufReader::new(port),
        })
    }

    fn io_error(&self, e: impl std::fmt::Display) -> BridgeError {
        BridgeError::SerialIo {
            port: self.settings.port.clone(),
            details: e.to_string(),
        }
    }
}

impl PacketSource for SerialConnection {
    fn name(&self) -> &str {
        &self.settings.port
    }

    fn bytes_available(&mut self) -> Result<usize, BridgeError> {
        let buffered = self.reader.buffer().len();
        let pending = self
            .reader
            .get_ref()
            .bytes_to_read()
            .map_err(|e| self.io_error(e))?;
        Ok(buffered + pending as usize)
    }

    fn read_packet(&mut self) -> Result<Vec<u8>, BridgeError> {
        read_line(&mut self.reader, MAX_PACKET_BYTES).map_err(|e| self.io_error(e))
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        debug!(port = %self.settings.port, "serial port closed");
    }
}

/// Read bytes up to and including the next `\n`, at most `max` bytes.
///
/// A read timeout after some bytes have arrived returns the partial line;
/// a timeout with nothing read, or end of stream with nothing read, is an
/// error.
///
/// A line longer than `max` is cut at the last complete UTF-8 character
/// within the cap and the remainder of that line is discarded, so the next
/// read starts on a fresh line.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, max: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match reader.by_ref().take(max as u64).read_until(b'\n', &mut buf) {
        Ok(0) => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no data before end of stream",
        )),
        Ok(_) if buf.len() >= max && buf.last() != Some(&b'\n') => {
            truncate_to_char_boundary(&mut buf);
            let mut discarded = Vec::new();
            // Best effort: a timeout or EOF here just ends the skip.
            let _ = reader.read_until(b'\n', &mut discarded);
            debug!(kept = buf.len(), discarded = discarded.len(), "oversized line truncated");
            Ok(buf)
        }
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::TimedOut && !buf.is_empty() => Ok(buf),
        Err(e) => Err(e),
    }
}

/// Drop a trailing, incomplete UTF-8 sequence left by a byte cap.
fn truncate_to_char_boundary(buf: &mut Vec<u8>) {
    if let Err(e) = std::str::from_utf8(buf)
        && e.error_len().is_none()
    {
        buf.truncate(e.valid_up_to());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields its chunks once, then reports a timeout forever.
    struct TimeoutAfter {
        chunks: Vec<Vec<u8>>,
    }

    impl Read for TimeoutAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn read_line_stops_at_newline() {
        let mut reader = Cursor::new(b"Current Temperature: 23.5 C\r\nAmmonia".to_vec());
        let line = read_line(&mut reader, MAX_PACKET_BYTES).unwrap();
        assert_eq!(line, b"Current Temperature: 23.5 C\r\n");
        let rest = read_line(&mut reader, MAX_PACKET_BYTES).unwrap();
        assert_eq!(rest, b"Ammonia");
    }

    #[test]
    fn read_line_caps_length_and_skips_rest_of_line() {
        let mut data = vec![b'x'; 10];
        data.extend_from_slice(b"\nAmmonia Level (Analog): 12\n");
        let mut reader = Cursor::new(data);
        let line = read_line(&mut reader, 4).unwrap();
        assert_eq!(line, b"xxxx");
        let next = read_line(&mut reader, MAX_PACKET_BYTES).unwrap();
        assert_eq!(next, b"Ammonia Level (Analog): 12\n");
    }

    #[test]
    fn read_line_cap_does_not_split_multibyte_character() {
        // '°' is two bytes (0xC2 0xB0); a cap of 4 lands between them.
        let mut reader = Cursor::new("abc°def\nnext\n".as_bytes().to_vec());
        let line = read_line(&mut reader, 4).unwrap();
        assert_eq!(line, b"abc");
        assert!(std::str::from_utf8(&line).is_ok());
        let next = read_line(&mut reader, MAX_PACKET_BYTES).unwrap();
        assert_eq!(next, b"next\n");
    }

    #[test]
    fn read_line_returns_partial_line_on_timeout() {
        let mut reader = BufReader::new(TimeoutAfter {
            chunks: vec![b"Critical Ammo".to_vec()],
        });
        let line = read_line(&mut reader, MAX_PACKET_BYTES).unwrap();
        assert_eq!(line, b"Critical Ammo");
    }

    #[test]
    fn read_line_timeout_without_data_is_error() {
        let mut reader = BufReader::new(TimeoutAfter { chunks: Vec::new() });
        let err = read_line(&mut reader, MAX_PACKET_BYTES).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn read_line_empty_stream_is_error() {
        let mut reader = Cursor::new(Vec::new());
        let err = read_line(&mut reader, MAX_PACKET_BYTES).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn default_settings_match_sensor_board() {
        let settings = SerialSettings::default();
        assert_eq!(settings.port, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 9600);
    }

    #[test]
    fn opening_missing_device_fails() {
        let settings = SerialSettings {
            port: "/dev/sensorbridge-no-such-device".to_string(),
            ..SerialSettings::default()
        };
        let err = SerialConnection::open(&settings).err().expect("open must fail");
        match err {
            BridgeError::SerialOpen { port, .. } => {
                assert_eq!(port, "/dev/sensorbridge-no-such-device")
            }
            other => panic!("expected SerialOpen, got {other:?}"),
        }
    }

    #[test]
    fn port_summary_display_includes_product() {
        let summary = PortSummary {
            port_name: "/dev/ttyUSB0".to_string(),
            port_type: "USB".to_string(),
            product: Some("CP2102".to_string()),
        };
        assert_eq!(summary.to_string(), "/dev/ttyUSB0 (USB, CP2102)");
    }
}
