use std::time::Duration;

use thiserror::Error;

use crate::device::capability::Capability;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to a Lightify gateway.
#[derive(Error, Debug)]
pub enum Error {
    /// The TCP handshake with the gateway did not complete.
    #[error("Failed to connect to gateway {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The gateway did not answer a command in time.
    #[error("No response from gateway within {0:?}")]
    Timeout(Duration),

    /// The command targets a feature the device does not report.
    #[error("Device {device} does not support {capability}")]
    UnsupportedCapability {
        device: String,
        capability: Capability,
    },

    /// A numeric command parameter is outside the accepted bound.
    #[error("Requested {parameter} {value} is out of range ({min}..={max})")]
    OutOfRange {
        parameter: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A device record or discovery response is too short to decode.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The connection pool could not hand out a session.
    #[error("Not connected to gateway: {0}")]
    NotConnected(String),

    /// A MAC string that cannot be turned back into eight wire bytes.
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    /// Socket failure on an established connection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for failures that leave the connection in an unknown state.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Io(_))
    }
}
