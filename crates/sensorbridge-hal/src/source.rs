//! The [`PacketSource`] trait.

use sensorbridge_types::BridgeError;

/// Longest line accepted from a device, in bytes.
///
/// Longer lines are split at this boundary so that a device that never
/// sends a newline cannot grow the read buffer without bound.
pub const MAX_PACKET_BYTES: usize = 4096;

/// A line-oriented input device.
///
/// The adapter checks [`bytes_available`](PacketSource::bytes_available)
/// before every read and sleeps when it returns `0`, so implementations must
/// not block in that call.
pub trait PacketSource: Send {
    /// Human-readable name for logs, e.g. `"/dev/ttyUSB0"`.
    fn name(&self) -> &str;

    /// Number of bytes that can be read without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SerialIo`] if the device cannot be queried.
    fn bytes_available(&mut self) -> Result<usize, BridgeError>;

    /// Read one packet: the bytes up to and including the next `\n`.
    ///
    /// The returned bytes are raw; decoding and trimming happen upstream.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SerialIo`] if nothing could be read.
    fn read_packet(&mut self) -> Result<Vec<u8>, BridgeError>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn bytes_available(&mut self) -> Result<usize, BridgeError> {
        (**self).bytes_available()
    }

    fn read_packet(&mut self) -> Result<Vec<u8>, BridgeError> {
        (**self).read_packet()
    }
}
