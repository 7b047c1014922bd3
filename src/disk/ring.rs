//! Persistent fixed-size ring store implementation
//!
//! The store owns one file of exactly `max_bytes` bytes: a 16-byte header
//! followed by a circular body of framed records. Appends write the frame
//! first and the advanced `last_end` pointer second, each followed by a
//! flush, so a crash between the two leaves a valid body with a stale
//! pointer rather than a torn frame reachable from the header.
//!
//! The header is re-read at the start of every operation. A header whose
//! magic matches but whose fields are damaged is preserved as-is; scans
//! starting from a nonsensical position simply terminate early, and the
//! damaged region is overwritten by later appends in natural course.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec;
use crate::disk::cursor::ReverseCursor;
use crate::disk::{
    LogConfig, LogRecord, Result, RingError, StoreHeader, FRAME_OVERHEAD, MIN_PAYLOAD_LEN,
};
use crate::fs::{FileHandle, FileSystem};
use crate::timer::Clock;

/// Smallest file that can hold the header plus one empty-message frame.
const MIN_FILE_BYTES: i32 = (StoreHeader::SIZE + MIN_PAYLOAD_LEN + FRAME_OVERHEAD) as i32;

/// Persistent, fixed-size, append-only ring store over a single file.
///
/// Not internally synchronized; callers invoking it from multiple threads
/// must serialize access externally.
pub struct RingStore {
    file: Box<dyn FileHandle>,
    config: LogConfig,
    clock: Arc<dyn Clock>,
}

impl RingStore {
    /// Open or create the store at `path`.
    ///
    /// Ensures the parent directory exists, pads or truncates the file to
    /// exactly `config.max_bytes`, and initializes a fresh header when the
    /// magic does not match. An existing magic-matched header is kept
    /// untouched, damaged or not.
    pub fn open(
        path: &Path,
        config: LogConfig,
        fs: &dyn FileSystem,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.max_bytes < MIN_FILE_BYTES {
            return Err(RingError::InvalidConfig(config.max_bytes));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !fs.exists(parent) {
                fs.create_dir_all(parent)?;
            }
        }

        let mut file = fs.open_read_write(path)?;
        if file.size()? != config.max_bytes as u64 {
            file.resize(config.max_bytes as u64)?;
        }

        let mut store = Self {
            file,
            config,
            clock,
        };

        let header = store.read_header()?;
        if !header.is_valid() {
            let fresh = StoreHeader::new(
                config.max_bytes - StoreHeader::SIZE as i32,
                config.format_version,
            );
            store.write_header(&fresh)?;
            store.file.flush()?;
            debug!(
                path = %path.display(),
                body_size = fresh.body_size,
                "initialized fresh ring header"
            );
        }

        Ok(store)
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Append one record, returning the number of body bytes written.
    ///
    /// Returns `Ok(0)` without touching the file when the payload cannot
    /// fit the body or its length is not representable in the u16 prefix.
    pub fn append(&mut self, message: &str, level: u8) -> Result<i32> {
        let msg = message.as_bytes();
        let payload_len = MIN_PAYLOAD_LEN + msg.len();

        let header = self.read_header()?;
        let body_size = header.body_size;
        if body_size <= 0 || payload_len > body_size as usize || payload_len > u16::MAX as usize {
            warn!(payload_len, body_size, "record rejected: larger than ring body");
            return Ok(0);
        }

        // Both length prefixes go out in the same buffered write, so a
        // crash can never leave only one side of the frame.
        let frame_len = payload_len + FRAME_OVERHEAD;
        let mut frame = vec![0u8; frame_len];
        codec::put_u16(&mut frame, 0, payload_len as u16);
        codec::put_i64(&mut frame, 2, self.clock.now_millis());
        frame[10] = level;
        frame[11..11 + msg.len()].copy_from_slice(msg);
        codec::put_u16(&mut frame, frame_len - 2, payload_len as u16);

        let start = wrap_position(header.last_end as i64, body_size);
        self.write_body(body_size, start, &frame)?;
        self.file.flush()?;

        let new_end = wrap_position(start as i64 + frame_len as i64, body_size);
        let updated = StoreHeader {
            last_end: new_end as i32,
            ..header
        };
        self.write_header(&updated)?;
        self.file.flush()?;

        Ok(frame_len as i32)
    }

    /// Return up to `count` records, newest first.
    pub fn tail(&mut self, count: i32) -> Result<Vec<LogRecord>> {
        self.scan(count.max(0) as usize, None)
    }

    /// Return up to `limit` records with `timestamp_millis >= cutoff_millis`,
    /// newest first. Stops at the first record older than the cutoff.
    pub fn since(&mut self, cutoff_millis: i64, limit: i32) -> Result<Vec<LogRecord>> {
        self.scan(limit.max(0) as usize, Some(cutoff_millis))
    }

    /// Persist any written data without closing the store.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flush and close the underlying file handle.
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn scan(&mut self, limit: usize, cutoff: Option<i64>) -> Result<Vec<LogRecord>> {
        let header = self.read_header()?;
        let mut cursor = ReverseCursor::new(&header);
        let mut records = Vec::new();

        while records.len() < limit {
            match cursor.next_back(self.file.as_mut())? {
                Some(record) => {
                    if let Some(cutoff) = cutoff {
                        if record.timestamp_millis < cutoff {
                            break;
                        }
                    }
                    records.push(record);
                }
                None => break,
            }
        }

        Ok(records)
    }

    fn read_header(&mut self) -> Result<StoreHeader> {
        let mut buf = [0u8; StoreHeader::SIZE];
        self.file.read_at(0, &mut buf)?;
        Ok(StoreHeader::decode(&buf))
    }

    fn write_header(&mut self, header: &StoreHeader) -> Result<()> {
        self.file.write_at(0, &header.encode())?;
        Ok(())
    }

    /// Write `data` to the body starting at body-relative `pos`, splitting
    /// at the body boundary as needed.
    fn write_body(&mut self, body_size: i32, mut pos: u32, mut data: &[u8]) -> Result<()> {
        let body = body_size as u64;
        while !data.is_empty() {
            let chunk = data.len().min((body - pos as u64) as usize);
            self.file
                .write_at(StoreHeader::SIZE as u64 + pos as u64, &data[..chunk])?;
            data = &data[chunk..];
            pos = if pos as u64 + chunk as u64 == body {
                0
            } else {
                pos + chunk as u32
            };
        }
        Ok(())
    }
}

/// Reduce a possibly out-of-range body position into `[0, body_size)`.
fn wrap_position(pos: i64, body_size: i32) -> u32 {
    pos.rem_euclid(body_size as i64) as u32
}
