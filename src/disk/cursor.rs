//! Reverse cursor for walking records newest-first
//!
//! The dual length prefix around every record payload is what makes this
//! possible without an index: the two bytes immediately behind any frame
//! boundary are the trailing length of the previous record, which gives
//! the distance back to that record's start.
//!
//! The cursor treats every inconsistency as the end of the scan:
//!
//! - a length prefix below the 9-byte minimum or above the body size
//!   (head-of-ring garbage, a torn write, or external damage)
//! - leading and trailing prefixes that disagree
//! - payload text that is not valid UTF-8
//!
//! Records gathered before the stop are kept; the file is never repaired.
//! The cursor also refuses to consume more than one body's worth of frame
//! bytes in total, which keeps a ring whose single record fills the body
//! exactly from being re-read forever.

use std::io;

use tracing::debug;

use crate::codec;
use crate::disk::{LogRecord, StoreHeader, FRAME_OVERHEAD, MIN_PAYLOAD_LEN};
use crate::fs::FileHandle;

/// Stateful newest-first walker over the framed records in the body.
pub struct ReverseCursor {
    /// Body size in bytes; all positions are taken modulo this.
    body_size: i64,
    /// Current scan origin: one past the end of the next record to yield.
    cursor: i64,
    /// Total frame bytes consumed so far.
    consumed: i64,
    /// Whether the scan has terminated.
    done: bool,
}

impl ReverseCursor {
    /// Start a scan from the header's `last_end`. A header with a
    /// nonsensical body size yields an immediately finished cursor.
    pub fn new(header: &StoreHeader) -> Self {
        let body_size = header.body_size as i64;
        let done = body_size <= 0;
        let cursor = if done {
            0
        } else {
            (header.last_end as i64).rem_euclid(body_size)
        };
        Self {
            body_size,
            cursor,
            consumed: 0,
            done,
        }
    }

    /// Decode the record ending just behind the cursor and step over it,
    /// or return `None` once the scan has terminated.
    pub fn next_back(&mut self, file: &mut dyn FileHandle) -> io::Result<Option<LogRecord>> {
        if self.done {
            return Ok(None);
        }

        // Peek the trailing length prefix just behind the cursor.
        let mut len_buf = [0u8; 2];
        self.read_body(file, self.wrap(self.cursor - 2), &mut len_buf)?;
        let payload_len = codec::get_u16(&len_buf, 0) as i64;

        if payload_len < MIN_PAYLOAD_LEN as i64 || payload_len > self.body_size {
            debug!(payload_len, "reverse scan stopped: length out of range");
            self.done = true;
            return Ok(None);
        }

        let frame_len = payload_len + FRAME_OVERHEAD as i64;
        if self.consumed + frame_len > self.body_size {
            self.done = true;
            return Ok(None);
        }

        let start = self.wrap(self.cursor - frame_len);
        let mut frame = vec![0u8; frame_len as usize];
        self.read_body(file, start, &mut frame)?;

        let leading = codec::get_u16(&frame, 0) as i64;
        let trailing = codec::get_u16(&frame, frame_len as usize - 2) as i64;
        if leading != payload_len || trailing != payload_len {
            debug!(
                leading,
                trailing, payload_len, "reverse scan stopped: length prefixes disagree"
            );
            self.done = true;
            return Ok(None);
        }

        let timestamp_millis = codec::get_i64(&frame, 2);
        let level = frame[10];
        let message = match std::str::from_utf8(&frame[11..frame_len as usize - 2]) {
            Ok(text) => text.to_owned(),
            Err(_) => {
                debug!("reverse scan stopped: payload is not valid UTF-8");
                self.done = true;
                return Ok(None);
            }
        };

        self.consumed += frame_len;
        self.cursor = start as i64;

        Ok(Some(LogRecord {
            timestamp_millis,
            level,
            message,
        }))
    }

    /// Reduce a possibly negative body position into `[0, body_size)`.
    fn wrap(&self, pos: i64) -> u64 {
        pos.rem_euclid(self.body_size) as u64
    }

    /// Fill `buf` from the body starting at body-relative `pos`, splitting
    /// at the body boundary as needed.
    fn read_body(&self, file: &mut dyn FileHandle, mut pos: u64, buf: &mut [u8]) -> io::Result<()> {
        let body = self.body_size as u64;
        let mut filled = 0;
        while filled < buf.len() {
            let chunk = (buf.len() - filled).min((body - pos) as usize);
            file.read_at(
                StoreHeader::SIZE as u64 + pos,
                &mut buf[filled..filled + chunk],
            )?;
            filled += chunk;
            pos = if pos + chunk as u64 == body {
                0
            } else {
                pos + chunk as u64
            };
        }
        Ok(())
    }
}
