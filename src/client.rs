//! Request-level device control: power, brightness and status queries.
//!
//! Each call resolves its target through the [`Registry`], builds a frame with
//! the codec and sends it over a fresh connection. Nothing is retried; failures
//! go straight back to the caller.

use crate::codec;
use crate::config::ClientConfig;
use crate::device::Device;
use crate::error::Result;
use crate::protocol::SequenceCounter;
use crate::registry::Registry;
use crate::transport::Transport;
use log::{debug, info};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use std::time::Duration;

/// Data point switching the device on or off.
pub const DP_POWER: &str = "20";
/// Data point holding brightness, 0 to 1000.
pub const DP_BRIGHTNESS: &str = "22";

pub const BRIGHTNESS_MIN: f64 = 0.0;
pub const BRIGHTNESS_MAX: f64 = 1000.0;

const TEST_POWER_DELAY: Duration = Duration::from_millis(500);

/// Decoded result of a status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// Truthiness of data point "20"
    pub on: bool,
    /// Data point "22" when it is a number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Number>,
    /// Every data point the device reported
    pub dps: Map<String, Value>,
}

impl DeviceStatus {
    /// Interprets a decoded response payload. A missing or non-object `dps`
    /// reads as no data points.
    pub fn from_payload(payload: &Value) -> Self {
        let dps = payload
            .get("dps")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let on = dps.get(DP_POWER).is_some_and(truthy);
        let brightness = match dps.get(DP_BRIGHTNESS) {
            Some(Value::Number(n)) => Some(n.clone()),
            _ => None,
        };
        Self { on, brightness, dps }
    }
}

/// Local-network client for the devices in a [`Registry`].
#[derive(Clone)]
pub struct TuyaClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    registry: Arc<Registry>,
    transport: Transport,
    seqno: SequenceCounter,
    config: ClientConfig,
}

impl TuyaClient {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, ClientConfig::default())
    }

    pub fn with_config(registry: Arc<Registry>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                registry,
                transport: Transport::new(&config),
                seqno: SequenceCounter::new(),
                config,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Sets one or more data points, fire-and-forget.
    pub async fn set_dps(&self, id_or_key: &str, dps: Map<String, Value>) -> Result<()> {
        let device = self.inner.registry.resolve(id_or_key)?;
        self.send_control(&device, &dps).await
    }

    /// Sets a single data point, fire-and-forget.
    pub async fn set_value(&self, id_or_key: &str, index: u32, value: Value) -> Result<()> {
        let mut dps = Map::new();
        dps.insert(index.to_string(), value);
        self.set_dps(id_or_key, dps).await
    }

    /// Switches the device on or off.
    pub async fn send_power(&self, id_or_key: &str, on: bool) -> Result<()> {
        let device = self.inner.registry.resolve(id_or_key)?;
        let mut dps = Map::new();
        dps.insert(DP_POWER.to_string(), Value::Bool(on));
        self.send_control(&device, &dps).await
    }

    /// Sets brightness, clamped to 0..=1000 and rounded to an integer.
    pub async fn send_brightness(&self, id_or_key: &str, value: f64) -> Result<()> {
        let device = self.inner.registry.resolve(id_or_key)?;
        let mut dps = Map::new();
        dps.insert(
            DP_BRIGHTNESS.to_string(),
            Value::from(clamp_brightness(value)),
        );
        self.send_control(&device, &dps).await
    }

    /// Asks the device for its data points and waits for the answer.
    pub async fn query_status(&self, id_or_key: &str) -> Result<DeviceStatus> {
        let device = self.inner.registry.resolve(id_or_key)?;
        let frame = codec::build_query_frame(&device, self.inner.seqno.next())?;
        let response = self
            .inner
            .transport
            .send_and_receive_frame(&device, &frame)
            .await?;
        let payload =
            codec::parse_response_frame_with(&device, &response, self.inner.config.padding)?;
        let status = DeviceStatus::from_payload(&payload);
        debug!("Status of {}: {:?}", device.dev_id, status);
        Ok(status)
    }

    /// Switches the device on, waits half a second, then switches it off.
    pub async fn test_power(&self, id_or_key: &str) -> Result<()> {
        self.send_power(id_or_key, true).await?;
        tokio::time::sleep(TEST_POWER_DELAY).await;
        self.send_power(id_or_key, false).await
    }

    async fn send_control(&self, device: &Device, dps: &Map<String, Value>) -> Result<()> {
        info!(
            "Setting {} on device {}",
            Value::Object(dps.clone()),
            device.dev_id
        );
        let frame = codec::build_control_frame(device, dps, self.inner.seqno.next())?;
        self.inner.transport.send_fire_and_forget(device, &frame).await
    }
}

/// Rounds half away from zero and clamps to 0..=1000. NaN becomes 0.
pub fn clamp_brightness(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX) as u32
}

/// Loose boolean reading of a data point value: false, null, 0, NaN and ""
/// are false, everything else is true.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
