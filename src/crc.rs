//! CRC-32 (IEEE 802.3, reflected polynomial 0xEDB88320) used for frame checksums.

use crc::{CRC_32_ISO_HDLC, Crc};

/// Table-driven engine; the 256-entry table is built at compile time.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Computes the CRC-32 of `length` bytes of `data` starting at `offset`.
///
/// The range is clamped to the buffer, so an out-of-range request checksums
/// whatever part of it exists.
pub fn crc32(data: &[u8], offset: usize, length: usize) -> u32 {
    let start = offset.min(data.len());
    let end = start.saturating_add(length).min(data.len());
    CRC32.checksum(&data[start..end])
}

/// CRC-32 of a whole buffer.
pub fn checksum(data: &[u8]) -> u32 {
    crc32(data, 0, data.len())
}
