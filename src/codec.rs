//! Packet codec: builds control and query frames and decodes device responses.
//!
//! Outgoing payloads are JSON objects encrypted with the device's local key.
//! Control frames carry a 15-byte plaintext version header in front of the
//! ciphertext; query frames carry the ciphertext alone.

use crate::crypto::{PaddingMode, TuyaCipher};
use crate::device::Device;
use crate::error::{Result, TuyaError};
use crate::protocol::{
    self, CommandType, FOOTER_LEN, HEADER_LEN, MIN_FRAME_LEN, TuyaMessage, VERSION_HEADER_LEN,
    Version,
};
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

const RETCODE_LEN: usize = 4;
const BLOCK_LEN: usize = 16;

/// JSON body shared by control and query commands. Field order matters to
/// some firmware, so this is a struct rather than a map.
#[derive(Serialize)]
struct CommandPayload<'a> {
    #[serde(rename = "devId")]
    dev_id: &'a str,
    uid: &'a str,
    t: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    dps: Option<&'a Map<String, Value>>,
}

/// Builds a control (0x07) frame setting `dps` on `device`.
pub fn build_control_frame(device: &Device, dps: &Map<String, Value>, seqno: u32) -> Result<Vec<u8>> {
    build_frame(device, CommandType::Control, Some(dps), seqno, timestamp())
}

/// Builds a status query (0x0a) frame for `device`.
pub fn build_query_frame(device: &Device, seqno: u32) -> Result<Vec<u8>> {
    build_frame(device, CommandType::DpQuery, None, seqno, timestamp())
}

fn build_frame(
    device: &Device,
    command: CommandType,
    dps: Option<&Map<String, Value>>,
    seqno: u32,
    t: u64,
) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(&CommandPayload {
        dev_id: &device.dev_id,
        uid: "",
        t,
        dps,
    })?;
    debug!(
        "Building frame: cmd=0x{:02X}, seqno={}, json={}",
        command as u32,
        seqno,
        String::from_utf8_lossy(&body)
    );

    let cipher = TuyaCipher::new(device.local_key_bytes())?;
    let encrypted = cipher.encrypt(&body)?;

    let payload = match command {
        CommandType::Control => {
            let mut p = version_header(device.ver).to_vec();
            p.extend_from_slice(&encrypted);
            p
        }
        _ => encrypted,
    };

    protocol::pack_message(&TuyaMessage {
        seqno,
        cmd: command as u32,
        payload,
    })
}

/// The version string left-justified in 15 zero-filled bytes.
pub fn version_header(version: Version) -> [u8; VERSION_HEADER_LEN] {
    let mut header = [0u8; VERSION_HEADER_LEN];
    let bytes = version.as_bytes();
    let n = bytes.len().min(VERSION_HEADER_LEN);
    header[..n].copy_from_slice(&bytes[..n]);
    header
}

/// Decodes a response frame into its JSON payload using lenient padding.
pub fn parse_response_frame(device: &Device, frame: &[u8]) -> Result<Value> {
    parse_response_frame_with(device, frame, PaddingMode::Lenient)
}

/// Decodes a response frame into its JSON payload.
///
/// The body between the 16-byte header and the 8-byte footer may start with
/// a 4-byte all-zero return code and/or a plaintext "3.3" header; both are
/// dropped before decryption. A frame cut short (no suffix, or a body that
/// is not whole cipher blocks) is a protocol error.
pub fn parse_response_frame_with(device: &Device, frame: &[u8], padding: PaddingMode) -> Result<Value> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(TuyaError::Protocol(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }
    debug!("Received frame (hex): {}", hex::encode(frame));
    if !protocol::ends_with_suffix(frame) {
        return Err(TuyaError::Protocol(format!(
            "missing frame terminator after {} bytes",
            frame.len()
        )));
    }

    match protocol::parse_header(frame) {
        Ok(header) => debug!(
            "Response header: seqno={}, cmd=0x{:02X} ({:?}), length={}",
            header.seqno,
            header.cmd,
            CommandType::from_u32(header.cmd),
            header.length
        ),
        Err(e) => warn!("Response from {} has a bad header: {}", device.dev_id, e),
    }
    if protocol::verify_crc(frame) == Some(false) {
        warn!("CRC mismatch in response from {}", device.dev_id);
    }

    let mut body = &frame[HEADER_LEN..frame.len() - FOOTER_LEN];
    if body.len() >= RETCODE_LEN && body[..RETCODE_LEN].iter().all(|&b| b == 0) {
        body = &body[RETCODE_LEN..];
    }
    if has_version_header(body) {
        body = &body[VERSION_HEADER_LEN..];
    }
    if body.len() % BLOCK_LEN != 0 {
        return Err(TuyaError::Protocol(format!(
            "encrypted body of {} bytes is not block aligned",
            body.len()
        )));
    }

    let cipher = TuyaCipher::new(device.local_key_bytes())?;
    let plain = cipher.decrypt(body, padding)?;
    let text = String::from_utf8_lossy(&plain);
    debug!("Decrypted payload: {}", text);

    serde_json::from_str(&text)
        .map_err(|e| TuyaError::Protocol(format!("Failed to parse JSON: {}", e)))
}

/// Devices prefix replies with a "3.3" header whatever version they were addressed with.
fn has_version_header(body: &[u8]) -> bool {
    body.len() >= VERSION_HEADER_LEN && body.starts_with(Version::V3_3.as_bytes())
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
