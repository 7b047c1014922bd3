//! In-memory coalescing stage in front of the disk store
//!
//! This module provides the data the dedup buffer works with:
//!
//! - `LogLevel`: the three severity levels and their on-disk byte values
//! - `PendingEntry`: the single coalescing slot, tracking how many
//!   consecutive identical entries it stands for and when the latest one
//!   arrived
//!
//! The buffer itself lives in `dedup`.

pub mod dedup;

pub use dedup::DedupBuffer;

/// Severity levels and their stored byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogLevel {
    /// Informational; formatted without a level token.
    Info = 1,
    /// Warning.
    Warning = 2,
    /// Error.
    Error = 3,
}

impl LogLevel {
    /// Decode a stored level byte, treating unknown values as `Info`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            2 => LogLevel::Warning,
            3 => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    /// The byte value written to disk for this level.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The single coalescing slot held by the dedup buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Tag of the coalesced entries.
    pub tag: String,
    /// Message of the coalesced entries.
    pub message: String,
    /// Level of the coalesced entries.
    pub level: LogLevel,
    /// How many consecutive identical entries this slot stands for.
    pub count: u32,
    /// Timestamp of the most recent coalesced entry, not the first.
    pub last_timestamp_millis: i64,
}

impl PendingEntry {
    /// Whether an incoming triple matches this slot.
    pub fn matches(&self, tag: &str, message: &str, level: LogLevel) -> bool {
        self.level == level && self.tag == tag && self.message == message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        assert_eq!(LogLevel::from_u8(LogLevel::Info.as_u8()), LogLevel::Info);
        assert_eq!(
            LogLevel::from_u8(LogLevel::Warning.as_u8()),
            LogLevel::Warning
        );
        assert_eq!(LogLevel::from_u8(LogLevel::Error.as_u8()), LogLevel::Error);
    }

    #[test]
    fn test_unknown_level_decodes_as_info() {
        assert_eq!(LogLevel::from_u8(0), LogLevel::Info);
        assert_eq!(LogLevel::from_u8(255), LogLevel::Info);
    }

    #[test]
    fn test_pending_match() {
        let entry = PendingEntry {
            tag: "net".to_string(),
            message: "timeout".to_string(),
            level: LogLevel::Warning,
            count: 3,
            last_timestamp_millis: 42,
        };
        assert!(entry.matches("net", "timeout", LogLevel::Warning));
        assert!(!entry.matches("net", "timeout", LogLevel::Error));
        assert!(!entry.matches("net", "retry", LogLevel::Warning));
        assert!(!entry.matches("db", "timeout", LogLevel::Warning));
    }
}
