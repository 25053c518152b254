//! Error types and result definitions for the tuyalan crate.
//! Includes Tuya-specific error codes and conversion from standard IO/JSON errors.

use thiserror::Error;

/// Represents all possible errors that can occur when talking to a Tuya device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TuyaError {
    /// No device in the registry matches the requested key or devId.
    /// Raised before any network I/O happens.
    #[error("Device '{0}' not found")]
    DeviceNotFound(String),

    /// The AES backend could not run (bad key length, unaligned ciphertext, ...)
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Connect, write or read failure at the transport
    #[error("Connection error: {0}")]
    Connection(String),

    /// Frame too short, oversized response or undecodable JSON
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Standard IO error outside the socket path
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization or deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// A device record failed validation
    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    /// Protocol revisions beyond 3.3 use HMAC framing, which is not supported
    #[error("Unsupported protocol version '{0}'")]
    UnsupportedVersion(String),
}

/// A specialized Result type for Tuya operations.
pub type Result<T> = std::result::Result<T, TuyaError>;

impl From<std::io::Error> for TuyaError {
    fn from(err: std::io::Error) -> Self {
        TuyaError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TuyaError {
    fn from(err: serde_json::Error) -> Self {
        TuyaError::Json(err.to_string())
    }
}

impl TuyaError {
    pub fn code(&self) -> u32 {
        match self {
            TuyaError::DeviceNotFound(_) => ERR_NOT_FOUND,
            TuyaError::Crypto(_) => ERR_KEY_OR_VER,
            TuyaError::Connection(_) => ERR_CONNECT,
            TuyaError::Protocol(_) => ERR_PAYLOAD,
            TuyaError::Io(_) => ERR_CONNECT,
            TuyaError::Json(_) => ERR_JSON,
            TuyaError::InvalidDevice(_) => ERR_PARAMS,
            TuyaError::UnsupportedVersion(_) => ERR_KEY_OR_VER,
        }
    }

    /// Returns the TinyTuya message associated with this error's code.
    pub fn message(&self) -> &'static str {
        get_error_message(self.code())
    }
}

// TinyTuya Error Response Codes
define_error_codes! {
    ERR_JSON = 900 => "Invalid JSON Response from Device",
    ERR_CONNECT = 901 => "Network Error: Unable to Connect",
    ERR_PAYLOAD = 904 => "Unexpected Payload from Device",
    ERR_PARAMS = 912 => "Missing Function Parameters",
    ERR_KEY_OR_VER = 914 => "Check device key or version",
    ERR_NOT_FOUND = 916 => "Device not found in registry",
}
