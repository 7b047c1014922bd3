//! Disk-based persistent ring store
//!
//! This module holds the on-disk vocabulary and the store itself:
//!
//! - `StoreHeader`: the 16-byte file header (magic, format version, body
//!   size, last-end pointer), serialized big-endian
//! - `LogRecord`: a decoded record as handed back to callers
//! - `LogConfig`: immutable store configuration
//! - `RingStore` (in `ring`): open, wrap-around append, newest-first
//!   scans, close
//! - `ReverseCursor` (in `cursor`): the backward frame walker the scans
//!   are built on
//!
//! The file is a fixed-size circular buffer. Each record is framed by
//! identical leading and trailing length prefixes, which is what makes
//! backward traversal possible without an index. Corruption anywhere in
//! the body terminates a scan cleanly rather than failing it.

pub mod cursor;
pub mod ring;

use std::io;

use thiserror::Error;

use crate::codec;

/// Error type for ring store operations.
#[derive(Debug, Error)]
pub enum RingError {
    /// The underlying filesystem failed. Propagated unchanged; the store
    /// makes no retry attempt.
    #[error("ring store I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The configured byte budget cannot hold the header plus one
    /// empty-message record.
    #[error("byte budget {0} is too small for a ring store")]
    InvalidConfig(i32),
}

/// Result type for ring store operations.
pub type Result<T> = std::result::Result<T, RingError>;

/// Payload bytes that precede the message text: 8-byte timestamp plus
/// 1-byte level. Also the minimum valid payload length.
pub const MIN_PAYLOAD_LEN: usize = 9;

/// Combined size of the two u16 length prefixes around a payload.
pub const FRAME_OVERHEAD: usize = 4;

/// On-disk store header, kept at file offset 0.
///
/// Read back from disk at the start of every operation and never cached
/// across operations, so external truncation or replacement of the file
/// is picked up on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    /// Magic number identifying the file format ("KLOG").
    pub magic: i32,
    /// Producer-controlled format version. Advisory; preserved on rewrite.
    pub format_version: i32,
    /// Size of the circular body region in bytes.
    pub body_size: i32,
    /// Body-relative offset one past the last written byte.
    pub last_end: i32,
}

impl StoreHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 16;

    /// Magic number for file format identification ("KLOG").
    pub const MAGIC: i32 = 0x4B4C_4F47;

    /// Create a header for a freshly initialized store.
    pub fn new(body_size: i32, format_version: i32) -> Self {
        Self {
            magic: Self::MAGIC,
            format_version,
            body_size,
            last_end: 0,
        }
    }

    /// Decode a header from its 16 on-disk bytes.
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            magic: codec::get_i32(buf, 0),
            format_version: codec::get_i32(buf, 4),
            body_size: codec::get_i32(buf, 8),
            last_end: codec::get_i32(buf, 12),
        }
    }

    /// Encode the header into its 16 on-disk bytes.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        codec::put_i32(&mut buf, 0, self.magic);
        codec::put_i32(&mut buf, 4, self.format_version);
        codec::put_i32(&mut buf, 8, self.body_size);
        codec::put_i32(&mut buf, 12, self.last_end);
        buf
    }

    /// Whether the magic matches the expected file format.
    pub fn is_valid(&self) -> bool {
        self.magic == Self::MAGIC
    }
}

/// A decoded log record. Immutable; owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Epoch milliseconds recorded at append time.
    pub timestamp_millis: i64,
    /// Severity level byte as stored.
    pub level: u8,
    /// The logged line.
    pub message: String,
}

/// Store configuration, immutable for the lifetime of a `RingStore`.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Total file size in bytes; the body is this minus the 16-byte
    /// header.
    pub max_bytes: i32,
    /// Format version written into fresh headers.
    pub format_version: i32,
    /// Whether the façade coalesces consecutive identical entries.
    pub dedup_enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024,
            format_version: 1,
            dedup_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = StoreHeader {
            magic: StoreHeader::MAGIC,
            format_version: 3,
            body_size: 1008,
            last_end: 137,
        };
        let decoded = StoreHeader::decode(&header.encode());
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_layout_is_big_endian() {
        let header = StoreHeader::new(1008, 1);
        let bytes = header.encode();
        // "KLOG"
        assert_eq!(&bytes[0..4], &[0x4B, 0x4C, 0x4F, 0x47]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
        assert_eq!(&bytes[8..12], &[0, 0, 0x03, 0xF0]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_header_validity() {
        let mut header = StoreHeader::new(100, 1);
        assert!(header.is_valid());
        header.magic = 0x12345678;
        assert!(!header.is_valid());
    }

    #[test]
    fn test_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.format_version, 1);
        assert!(config.dedup_enabled);
        assert!(config.max_bytes > StoreHeader::SIZE as i32);
    }
}
