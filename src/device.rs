//! Device descriptors: identity and connection facts for one controllable unit.
//! Records come from the external device store as loosely typed JSON objects.

use crate::error::{Result, TuyaError};
use crate::protocol::Version;
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_PORT: u16 = 6668;
pub const DEFAULT_NAME: &str = "Tuya Led";
pub const NEW_DEVICE_NAME: &str = "New Device";
pub const LOCAL_KEY_LEN: usize = 16;

const KEY_KEY: &str = "key";
const KEY_NAME: &str = "name";
const KEY_IP: &str = "ip";
const KEY_PORT: &str = "port";
const KEY_DEV_ID: &str = "devId";
const KEY_LOCAL_KEY: &str = "localKey";
const KEY_VER: &str = "ver";

/// A Tuya device reachable on the local network.
///
/// Serializes to the same record shape the device store holds:
/// `{key, name, ip, port, devId, localKey, ver}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Stable identifier of the record, falls back to `dev_id`
    pub key: String,
    /// Display label
    pub name: String,
    pub ip: String,
    pub port: u16,
    /// Protocol-level device id embedded in every payload
    #[serde(rename = "devId")]
    pub dev_id: String,
    /// 16 ASCII characters used directly as the AES-128 key
    #[serde(rename = "localKey")]
    pub local_key: String,
    pub ver: Version,
}

impl Device {
    /// Create a device with default name and port. The record key is the device id.
    pub fn new<I, A, K>(dev_id: I, ip: A, local_key: K, version: Version) -> Self
    where
        I: Into<String>,
        A: Into<String>,
        K: Into<String>,
    {
        let dev_id = dev_id.into();
        Self {
            key: dev_id.clone(),
            name: DEFAULT_NAME.to_string(),
            ip: ip.into(),
            port: DEFAULT_PORT,
            dev_id,
            local_key: local_key.into(),
            ver: version,
        }
    }

    /// Empty record with a fresh random key, ready to be filled in and saved.
    pub fn new_template() -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            name: NEW_DEVICE_NAME.to_string(),
            ip: String::new(),
            port: DEFAULT_PORT,
            dev_id: String::new(),
            local_key: String::new(),
            ver: Version::default(),
        }
    }

    pub fn with_key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `ip:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn local_key_bytes(&self) -> &[u8] {
        self.local_key.as_bytes()
    }

    /// Checks a record the way the settings editor does before saving it.
    /// Returns one message per problem; an empty list means the device is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errs = Vec::new();
        if self.name.trim().is_empty() {
            errs.push("Name is required".to_string());
        }
        if self.ip.trim().is_empty() {
            errs.push("IP is required".to_string());
        }
        if self.port == 0 {
            errs.push("Port 1..65535".to_string());
        }
        if self.dev_id.trim().is_empty() {
            errs.push("devId is required".to_string());
        }
        if !is_valid_local_key(&self.local_key) {
            errs.push("localKey: 16 chars".to_string());
        }
        errs
    }

    /// Builds a device from one store record.
    ///
    /// Missing optional fields take their defaults. Fails when `ip` or `devId`
    /// is missing, the local key is not 16 ASCII characters, or the protocol
    /// version is not one this client speaks.
    pub fn from_record(record: &Value) -> Result<Self> {
        let obj = record
            .as_object()
            .ok_or_else(|| TuyaError::InvalidDevice("record is not an object".into()))?;

        let dev_id = field_string(obj, KEY_DEV_ID);
        let ip = field_string(obj, KEY_IP);
        let local_key = field_string(obj, KEY_LOCAL_KEY);

        if ip.is_empty() {
            return Err(TuyaError::InvalidDevice(format!("{}: missing ip", dev_id)));
        }
        if dev_id.is_empty() {
            return Err(TuyaError::InvalidDevice(format!("{}: missing devId", ip)));
        }
        if !is_valid_local_key(&local_key) {
            return Err(TuyaError::InvalidDevice(format!(
                "{}: localKey must be {} ASCII characters",
                dev_id, LOCAL_KEY_LEN
            )));
        }

        let key = match field_string(obj, KEY_KEY) {
            k if k.is_empty() => dev_id.clone(),
            k => k,
        };
        let name = match field_string(obj, KEY_NAME) {
            n if n.is_empty() => DEFAULT_NAME.to_string(),
            n => n,
        };
        let ver = match field_string(obj, KEY_VER) {
            v if v.is_empty() => Version::default(),
            v => v.parse()?,
        };
        let port = parse_port(obj.get(KEY_PORT))
            .ok_or_else(|| TuyaError::InvalidDevice(format!("{}: invalid port", dev_id)))?;

        Ok(Self {
            key,
            name,
            ip,
            port,
            dev_id,
            local_key,
            ver,
        })
    }
}

/// The key a store record is identified by: `key`, falling back to `devId`.
/// `None` for non-objects and records carrying neither.
pub fn record_key(record: &Value) -> Option<String> {
    let obj = record.as_object()?;
    [KEY_KEY, KEY_DEV_ID]
        .into_iter()
        .map(|name| field_string(obj, name))
        .find(|k| !k.is_empty())
}

pub fn is_valid_local_key(key: &str) -> bool {
    key.len() == LOCAL_KEY_LEN && key.is_ascii()
}

/// Reads a field as text. Numbers and booleans are stringified; null, false
/// and missing fields read as empty.
fn field_string(obj: &Map<String, Value>, name: &str) -> String {
    match obj.get(name) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

/// Missing, null, zero and empty values mean the default port.
fn parse_port(value: Option<&Value>) -> Option<u16> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Some(DEFAULT_PORT),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) => Some(DEFAULT_PORT),
            Some(p) => u16::try_from(p).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f > 0.0 && *f <= u16::MAX as f64)
                .map(|f| f as u16),
        },
        Some(Value::String(s)) if s.trim().is_empty() => Some(DEFAULT_PORT),
        Some(Value::String(s)) => s.trim().parse::<u16>().ok().filter(|p| *p != 0),
        _ => None,
    }
}
