//! Tuya wire protocol implementation (55AA framing, versions 3.1 to 3.3).
//! Handles packet framing, header parsing, CRC footers and sequence numbers.

use crate::crc;
use crate::error::{Result, TuyaError};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};

pub const PREFIX_55AA: u32 = 0x000055AA;
pub const SUFFIX_55AA: u32 = 0x0000AA55;

/// Prefix, sequence, command and length fields.
pub const HEADER_LEN: usize = 16;
/// CRC and suffix.
pub const FOOTER_LEN: usize = 8;
/// Smallest frame a device can send back.
pub const MIN_FRAME_LEN: usize = 24;
/// Plaintext version header length ("3.3" followed by zero fill).
pub const VERSION_HEADER_LEN: usize = 15;

define_command_type! {
    Control = 0x07,
    DpQuery = 0x0a,
}

define_version! {
    V3_1 = "3.1",
    V3_2 = "3.2",
    V3_3 = "3.3",
}

impl Default for Version {
    fn default() -> Self {
        Version::V3_3
    }
}

/// Tuya protocol message structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuyaMessage {
    /// Sequence number
    pub seqno: u32,
    /// Command code
    pub cmd: u32,
    /// Frame payload (version header and/or ciphertext)
    pub payload: Vec<u8>,
}

/// Tuya protocol header structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuyaHeader {
    pub prefix: u32,
    pub seqno: u32,
    pub cmd: u32,
    /// Value of the length field: payload + CRC + suffix
    pub length: u32,
}

impl TuyaHeader {
    /// Total frame size announced by this header.
    pub fn total_length(&self) -> usize {
        HEADER_LEN + self.length as usize
    }
}

/// Pack a message into a complete 55AA frame with CRC-32 footer.
pub fn pack_message(msg: &TuyaMessage) -> Result<Vec<u8>> {
    let length = msg.payload.len() + FOOTER_LEN;
    let length = u32::try_from(length)
        .map_err(|_| TuyaError::Protocol(format!("payload too large: {} bytes", length)))?;

    let mut data = Vec::with_capacity(HEADER_LEN + length as usize);
    data.write_u32::<BigEndian>(PREFIX_55AA)?;
    data.write_u32::<BigEndian>(msg.seqno)?;
    data.write_u32::<BigEndian>(msg.cmd)?;
    data.write_u32::<BigEndian>(length)?;
    data.extend_from_slice(&msg.payload);

    let crc_val = crc::crc32(&data, 0, data.len());
    data.write_u32::<BigEndian>(crc_val)?;
    data.write_u32::<BigEndian>(SUFFIX_55AA)?;

    Ok(data)
}

/// Parse the 16-byte header at the start of `data`.
pub fn parse_header(data: &[u8]) -> Result<TuyaHeader> {
    if data.len() < HEADER_LEN {
        return Err(TuyaError::Protocol("Header too short".into()));
    }

    let mut cursor = Cursor::new(data);
    let prefix = cursor.read_u32::<BigEndian>()?;
    if prefix != PREFIX_55AA {
        return Err(TuyaError::Protocol(format!("Invalid prefix 0x{:08X}", prefix)));
    }
    let seqno = cursor.read_u32::<BigEndian>()?;
    let cmd = cursor.read_u32::<BigEndian>()?;
    let length = cursor.read_u32::<BigEndian>()?;

    Ok(TuyaHeader {
        prefix,
        seqno,
        cmd,
        length,
    })
}

/// Returns true when the last four bytes of `data` are the 55AA suffix.
pub fn ends_with_suffix(data: &[u8]) -> bool {
    data.len() >= 4 && BigEndian::read_u32(&data[data.len() - 4..]) == SUFFIX_55AA
}

/// Checks the CRC footer of a complete frame.
///
/// Returns `None` when the frame is too short or not terminated, so there is
/// no footer to check.
pub fn verify_crc(frame: &[u8]) -> Option<bool> {
    if frame.len() < MIN_FRAME_LEN || !ends_with_suffix(frame) {
        return None;
    }
    let crc_pos = frame.len() - FOOTER_LEN;
    let received = BigEndian::read_u32(&frame[crc_pos..crc_pos + 4]);
    Some(crc::crc32(frame, 0, crc_pos) == received)
}

/// Frame sequence numbers shared by every device and command of one client.
///
/// Starts at 1 and wraps on overflow.
#[derive(Debug)]
pub struct SequenceCounter(AtomicU32);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(value: u32) -> Self {
        Self(AtomicU32::new(value))
    }

    /// Returns the current value and advances the counter.
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Value the next frame will carry.
    pub fn peek(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
