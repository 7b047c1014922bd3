//! Basic usage example for the klog ring store
//!
//! This example demonstrates:
//! 1. Initializing the global logger over a temporary file
//! 2. Logging at all three levels, including a coalesced repeat run
//! 3. Flushing pending output with shutdown
//! 4. Reading recent history back, newest first
//! 5. Reopening the store and showing that records survived
//!
//! The ring file is written under the system temp directory and reused
//! across runs, so running the example twice shows the previous run's
//! lines in the tail output.

use klog_ring_store::{initialize, LogConfig, StdoutSink};
use std::sync::Arc;

fn main() {
    let store_path = std::env::temp_dir().join("klog_example.klog");
    println!("Using ring store at: {:?}", store_path);

    // 64 KiB budget; the file never grows beyond this.
    let config = LogConfig {
        max_bytes: 64 * 1024,
        ..LogConfig::default()
    };

    let logger = initialize(&store_path, config, Arc::new(StdoutSink))
        .expect("Failed to initialize logger");
    println!("Device id: {}", logger.device_id());

    // Plain lines at each level. Identical consecutive entries coalesce;
    // the repeated warning below becomes one line with a repeat count.
    logger.log("app", "starting up");
    for _ in 0..4 {
        logger.log_w("net", "connection lost, retrying");
    }
    logger.log_e("db", "migration failed");
    logger.log("app", "ready");

    // Flush the pending coalesced entry and sync the file.
    logger.shutdown().expect("Failed to flush logger");

    // Read the five most recent persisted records, newest first.
    println!("\nMost recent records:");
    let records = logger.tail(5).expect("Failed to read tail");
    for record in &records {
        println!("  level={} ts={} {}", record.level, record.timestamp_millis, record.message);
    }

    // Time-windowed read: everything from the last minute.
    let a_minute_ago = records
        .first()
        .map(|record| record.timestamp_millis - 60_000)
        .unwrap_or(0);
    let recent = logger
        .since(a_minute_ago, 100)
        .expect("Failed to read window");
    println!("\n{} records in the last minute", recent.len());
}
