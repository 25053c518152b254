//! # tuyalan
//!
//! Asynchronous local-network control of Tuya plugs and lights speaking
//! protocol 3.1 to 3.3, without any cloud round trip.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tuyalan::{MemoryStore, Registry, TuyaClient};
//!
//! # async fn run() -> tuyalan::error::Result<()> {
//! let store = MemoryStore::new(
//!     r#"[{"ip":"192.168.1.50","devId":"DEVICE_ID","localKey":"0123456789abcdef"}]"#,
//! );
//! let client = TuyaClient::new(Registry::open(Arc::new(store))?);
//! client.send_power("DEVICE_ID", true).await?;
//! let status = client.query_status("DEVICE_ID").await?;
//! println!("on={} brightness={:?}", status.on, status.brightness);
//! # Ok(())
//! # }
//! ```
//!
#[macro_use]
pub mod macros;
pub mod client;
pub mod codec;
pub mod config;
pub mod crc;
pub mod crypto;
pub mod device;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod transport;

pub use client::{DeviceStatus, TuyaClient};
pub use config::ClientConfig;
pub use crypto::PaddingMode;
pub use device::Device;
pub use error::TuyaError;
pub use protocol::{CommandType, Version};
pub use registry::{DeviceSubscription, Registry};
pub use store::{DeviceStore, MemoryStore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}
