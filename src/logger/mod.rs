//! Logging façade over the ring store and dedup buffer
//!
//! The façade owns the wiring: it opens the ring store, constructs the
//! dedup buffer with a flush callback that formats a display line and
//! routes it to both sinks, and serializes everything behind its own
//! locks so the core components can stay unsynchronized.
//!
//! A formatted line looks like
//!
//! ```text
//! [2026-08-02 14:03:59.120] WARNING [net] connection lost (repeat 4 times)
//! ```
//!
//! with the level token omitted for INFO and the repeat suffix present
//! only when more than one consecutive identical entry was coalesced.
//! Timestamps are rendered in the system local timezone; the stored
//! record keeps zone-free epoch milliseconds.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, TimeZone};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::disk::ring::RingStore;
use crate::disk::{LogConfig, LogRecord, Result as RingResult};
use crate::fs::{FileSystem, NativeFileSystem};
use crate::memory::dedup::DedupBuffer;
use crate::memory::{LogLevel, PendingEntry};
use crate::timer::{Clock, DelayScheduler, SystemClock, ThreadScheduler};

/// Errors surfaced by the façade itself.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// The global logger was used before `initialize`.
    #[error("logger used before initialize")]
    NotInitialized,
}

/// Console output sink. Receives fully preformatted lines; the `tag` is
/// passed alongside for sinks that route by it.
pub trait ConsoleSink: Send + Sync {
    /// Emit an INFO line.
    fn log(&self, tag: &str, message: &str);
    /// Emit a WARNING line.
    fn log_w(&self, tag: &str, message: &str);
    /// Emit an ERROR line.
    fn log_e(&self, tag: &str, message: &str);
}

/// Sink that prints every line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn log(&self, _tag: &str, message: &str) {
        println!("{message}");
    }

    fn log_w(&self, _tag: &str, message: &str) {
        println!("{message}");
    }

    fn log_e(&self, _tag: &str, message: &str) {
        eprintln!("{message}");
    }
}

/// Source of RFC 4122 v4 identifier strings.
pub trait UuidSource: Send + Sync {
    /// Produce a fresh identifier in canonical hyphenated form.
    fn generate(&self) -> String;
}

/// Random v4 UUID source.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomUuid;

impl UuidSource for RandomUuid {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Shared state reachable from the dedup flush callback.
struct LoggerCore {
    ring: Mutex<RingStore>,
    sink: Arc<dyn ConsoleSink>,
}

impl LoggerCore {
    /// Format a coalesced entry and hand it to both sinks.
    fn emit(&self, entry: &PendingEntry) {
        let line = format_line(entry);
        match entry.level {
            LogLevel::Warning => self.sink.log_w(&entry.tag, &line),
            LogLevel::Error => self.sink.log_e(&entry.tag, &line),
            LogLevel::Info => self.sink.log(&entry.tag, &line),
        }
        let mut ring = self.ring.lock();
        if let Err(err) = ring.append(&line, entry.level.as_u8()) {
            error!(%err, "failed to persist log line");
        }
    }
}

/// The logging façade.
pub struct Logger {
    core: Arc<LoggerCore>,
    dedup: Option<DedupBuffer>,
    clock: Arc<dyn Clock>,
    device_id: String,
}

impl Logger {
    /// Open a logger over `path` with the production filesystem, clock,
    /// timer scheduler, and identifier source.
    pub fn new(path: &Path, config: LogConfig, sink: Arc<dyn ConsoleSink>) -> RingResult<Self> {
        Self::with_parts(
            path,
            config,
            sink,
            &NativeFileSystem,
            Arc::new(SystemClock),
            Arc::new(ThreadScheduler),
            &RandomUuid,
        )
    }

    /// Open a logger with every collaborator injected. Tests use this to
    /// substitute a controlled clock, scheduler, and filesystem.
    #[allow(clippy::too_many_arguments)]
    pub fn with_parts(
        path: &Path,
        config: LogConfig,
        sink: Arc<dyn ConsoleSink>,
        fs: &dyn FileSystem,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn DelayScheduler>,
        ids: &dyn UuidSource,
    ) -> RingResult<Self> {
        let ring = RingStore::open(path, config, fs, clock.clone())?;
        let core = Arc::new(LoggerCore {
            ring: Mutex::new(ring),
            sink,
        });

        let dedup = if config.dedup_enabled {
            let flush_core = core.clone();
            Some(DedupBuffer::new(
                clock.clone(),
                scheduler,
                Box::new(move |entry| flush_core.emit(&entry)),
            ))
        } else {
            None
        };

        let device_id = ids.generate();
        info!(device_id = %device_id, path = %path.display(), "log store initialized");

        Ok(Self {
            core,
            dedup,
            clock,
            device_id,
        })
    }

    /// The per-process device identifier generated at initialization.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Log an INFO entry.
    pub fn log(&self, tag: &str, message: &str) {
        self.add(tag, message, LogLevel::Info);
    }

    /// Log a WARNING entry.
    pub fn log_w(&self, tag: &str, message: &str) {
        self.add(tag, message, LogLevel::Warning);
    }

    /// Log an ERROR entry.
    pub fn log_e(&self, tag: &str, message: &str) {
        self.add(tag, message, LogLevel::Error);
    }

    /// Return up to `count` persisted records, newest first.
    pub fn tail(&self, count: i32) -> RingResult<Vec<LogRecord>> {
        self.core.ring.lock().tail(count)
    }

    /// Return up to `limit` persisted records no older than
    /// `cutoff_millis`, newest first.
    pub fn since(&self, cutoff_millis: i64, limit: i32) -> RingResult<Vec<LogRecord>> {
        self.core.ring.lock().since(cutoff_millis, limit)
    }

    /// Flush any pending coalesced entry and sync the store to disk. The
    /// file handle itself closes when the logger is dropped.
    pub fn shutdown(&self) -> RingResult<()> {
        if let Some(buffer) = &self.dedup {
            buffer.flush();
        }
        self.core.ring.lock().sync()
    }

    fn add(&self, tag: &str, message: &str, level: LogLevel) {
        match &self.dedup {
            Some(buffer) => buffer.add(tag, message, level),
            None => self.core.emit(&PendingEntry {
                tag: tag.to_owned(),
                message: message.to_owned(),
                level,
                count: 1,
                last_timestamp_millis: self.clock.now_millis(),
            }),
        }
    }
}

/// Render a coalesced entry into its display line.
fn format_line(entry: &PendingEntry) -> String {
    let stamp = format_timestamp(entry.last_timestamp_millis);
    let token = match entry.level {
        LogLevel::Warning => "WARNING ",
        LogLevel::Error => "ERROR ",
        LogLevel::Info => "",
    };
    let mut line = format!("[{stamp}] {token}[{}] {}", entry.tag, entry.message);
    if entry.count > 1 {
        line.push_str(&format!(" (repeat {} times)", entry.count));
    }
    line
}

/// Render epoch milliseconds as local wall-clock time with millisecond
/// precision. Out-of-range timestamps fall back to the raw number.
fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|when| when.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: LogLevel, count: u32) -> PendingEntry {
        PendingEntry {
            tag: "net".to_string(),
            message: "connection lost".to_string(),
            level,
            count,
            last_timestamp_millis: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_info_line_has_no_level_token() {
        let line = format_line(&entry(LogLevel::Info, 1));
        assert!(line.contains("] [net] connection lost"));
        assert!(!line.contains("WARNING"));
        assert!(!line.contains("ERROR"));
        assert!(!line.contains("repeat"));
    }

    #[test]
    fn test_warning_and_error_tokens() {
        let warn_line = format_line(&entry(LogLevel::Warning, 1));
        assert!(warn_line.contains("] WARNING [net] "));

        let error_line = format_line(&entry(LogLevel::Error, 1));
        assert!(error_line.contains("] ERROR [net] "));
    }

    #[test]
    fn test_repeat_suffix() {
        let line = format_line(&entry(LogLevel::Info, 5));
        assert!(line.ends_with(" (repeat 5 times)"));
    }

    #[test]
    fn test_timestamp_shape() {
        // "yyyy-MM-dd HH:mm:ss.SSS" is always 23 characters
        let stamp = format_timestamp(1_700_000_000_000);
        assert_eq!(stamp.len(), 23);
        assert_eq!(stamp.as_bytes()[4], b'-');
        assert_eq!(stamp.as_bytes()[10], b' ');
        assert_eq!(stamp.as_bytes()[19], b'.');
    }

    #[test]
    fn test_random_uuid_shape() {
        let id = RandomUuid.generate();
        assert_eq!(id.len(), 36);
        for index in [8, 13, 18, 23] {
            assert_eq!(id.as_bytes()[index], b'-');
        }
    }
}
