//! Client configuration: timeouts, read buffer limits and padding policy.
//!
//! All fields have defaults, so hosts can deserialize a partial JSON object
//! (durations are expressed in milliseconds).

use crate::crypto::PaddingMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(4);
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_READ_CHUNK: usize = 1024;
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on establishing the TCP connection.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,

    /// Hard ceiling on the query read loop, measured from the start of the call.
    #[serde(with = "millis")]
    pub response_timeout: Duration,

    /// How long a fire-and-forget send waits for the device's acknowledgement.
    #[serde(with = "millis")]
    pub ack_timeout: Duration,

    /// Bytes requested per socket read.
    pub read_chunk_size: usize,

    /// Largest response the read loop accumulates before giving up.
    pub max_frame_size: usize,

    /// Padding check applied when decrypting responses.
    pub padding: PaddingMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK,
            max_frame_size: DEFAULT_MAX_FRAME,
            padding: PaddingMode::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
