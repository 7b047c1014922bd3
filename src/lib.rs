//! Klog Ring Store - an embedded, fixed-size, append-only log store
//! writing to a console sink and a persistent binary ring buffer.
//!
//! # Overview
//!
//! The crate provides a logging system with two core components:
//!
//! 1. A persistent, fixed-size ring store on disk: a 16-byte header
//!    followed by a circular body of doubly-framed records, supporting
//!    wrap-around appends, newest-first reads, and time-windowed reads
//! 2. A single-slot deduplication buffer that coalesces consecutive
//!    identical entries and flushes them after 20 seconds of silence with
//!    a repetition count
//!
//! A façade ties the two together: it formats display lines, mirrors them
//! to a console sink, and persists them in the ring store.
//!
//! # Key Features
//!
//! - Bounded storage: the file never grows beyond the configured budget
//! - Crash tolerance: dual length prefixes let scans reject torn frames;
//!   corruption truncates a read instead of failing it
//! - Restart survival: records persist across process restarts
//! - Reverse reads without an index, newest first
//! - Injectable filesystem, clock, and timer for deterministic tests
//!
//! # Usage
//!
//! The library is typically used by:
//! 1. Initializing the global logger with a path and configuration
//! 2. Logging through `log`, `log_w`, and `log_e`
//! 3. Reading recent history back with `tail` or `since`
//!
//! See `demos/basic_usage.rs` for a complete walkthrough.

#![deny(missing_docs)]

pub mod codec;
pub mod disk;
pub mod fs;
pub mod logger;
pub mod memory;
pub mod timer;

pub use disk::ring::RingStore;
pub use disk::{LogConfig, LogRecord, RingError, StoreHeader};
pub use logger::{ConsoleSink, FacadeError, Logger, RandomUuid, StdoutSink, UuidSource};
pub use memory::{DedupBuffer, LogLevel, PendingEntry};
pub use timer::{Cancellable, Clock, DelayScheduler, SystemClock, ThreadScheduler};

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Global façade instance, set once by `initialize`.
static LOGGER: OnceCell<Arc<Logger>> = OnceCell::new();

/// Initialize the global logger over the given path and configuration.
///
/// The first successful call wins; later calls return the existing
/// instance and ignore their arguments.
pub fn initialize(
    path: &Path,
    config: LogConfig,
    sink: Arc<dyn ConsoleSink>,
) -> disk::Result<Arc<Logger>> {
    let logger = LOGGER.get_or_try_init(|| Logger::new(path, config, sink).map(Arc::new))?;
    Ok(logger.clone())
}

/// Get the global logger, failing if `initialize` has not run yet.
pub fn global() -> Result<Arc<Logger>, FacadeError> {
    LOGGER.get().cloned().ok_or(FacadeError::NotInitialized)
}

/// Log an INFO entry through the global logger.
pub fn log(tag: &str, message: &str) -> Result<(), FacadeError> {
    global().map(|logger| logger.log(tag, message))
}

/// Log a WARNING entry through the global logger.
pub fn log_w(tag: &str, message: &str) -> Result<(), FacadeError> {
    global().map(|logger| logger.log_w(tag, message))
}

/// Log an ERROR entry through the global logger.
pub fn log_e(tag: &str, message: &str) -> Result<(), FacadeError> {
    global().map(|logger| logger.log_e(tag, message))
}

/// Flush pending output and sync the global logger's store to disk.
pub fn shutdown() -> Result<(), FacadeError> {
    let logger = global()?;
    if let Err(err) = logger.shutdown() {
        tracing::error!(%err, "shutdown flush failed");
    }
    Ok(())
}
