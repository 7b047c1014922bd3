//! Single-slot deduplication buffer with a silence-based flush timer
//!
//! Consecutive identical `(tag, message, level)` triples are coalesced
//! into one pending slot. The slot is emitted exactly once, either when a
//! differing triple arrives or after 20 seconds of silence following the
//! last arrival.
//!
//! Invariants:
//!
//! - at most one pending slot exists at any time
//! - at most one timer is armed at any time; re-arming cancels first
//! - exactly one timer is armed whenever the slot is non-empty
//! - the slot's timestamp is that of the most recent coalesced arrival
//!
//! A scheduler callback may begin running on its own thread in the same
//! instant a new arrival cancels it. Each armed timer therefore carries a
//! generation number; a fire whose generation no longer matches the
//! buffer's is ignored, so a slot can never be emitted twice.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::memory::{LogLevel, PendingEntry};
use crate::timer::{Cancellable, Clock, DelayScheduler};

/// Silence window after the last arrival before the slot is flushed.
pub const SILENCE_TIMEOUT_MS: u64 = 20_000;

type FlushFn = Box<dyn Fn(PendingEntry) + Send + Sync>;

struct DedupState {
    pending: Option<PendingEntry>,
    timer: Option<Box<dyn Cancellable>>,
    generation: u64,
}

struct DedupShared {
    state: Mutex<DedupState>,
    clock: Arc<dyn Clock>,
    on_flush: FlushFn,
}

impl DedupShared {
    /// Timer-thread entry point. Emits the slot only if the firing timer
    /// is still the current one.
    fn on_timer_fire(weak: Weak<DedupShared>, generation: u64) {
        let shared = match weak.upgrade() {
            Some(shared) => shared,
            None => return,
        };
        let flushed = {
            let mut state = shared.state.lock();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            state.generation += 1;
            state.pending.take()
        };
        if let Some(entry) = flushed {
            (shared.on_flush)(entry);
        }
    }
}

/// Coalescer for consecutive identical log entries.
pub struct DedupBuffer {
    shared: Arc<DedupShared>,
    scheduler: Arc<dyn DelayScheduler>,
    silence_ms: u64,
}

impl DedupBuffer {
    /// Create a buffer with the standard 20-second silence window.
    pub fn new(
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn DelayScheduler>,
        on_flush: FlushFn,
    ) -> Self {
        Self::with_silence(SILENCE_TIMEOUT_MS, clock, scheduler, on_flush)
    }

    /// Create a buffer with a custom silence window.
    pub fn with_silence(
        silence_ms: u64,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn DelayScheduler>,
        on_flush: FlushFn,
    ) -> Self {
        Self {
            shared: Arc::new(DedupShared {
                state: Mutex::new(DedupState {
                    pending: None,
                    timer: None,
                    generation: 0,
                }),
                clock,
                on_flush,
            }),
            scheduler,
            silence_ms,
        }
    }

    /// Feed one entry into the buffer.
    ///
    /// A triple matching the pending slot bumps its count and timestamp
    /// and restarts the silence timer. A differing triple flushes the old
    /// slot and starts a fresh one.
    pub fn add(&self, tag: &str, message: &str, level: LogLevel) {
        let now = self.shared.clock.now_millis();
        let flushed = {
            let mut state = self.shared.state.lock();

            let previous = match state.pending.take() {
                Some(mut slot) if slot.matches(tag, message, level) => {
                    slot.count += 1;
                    slot.last_timestamp_millis = now;
                    state.pending = Some(slot);
                    None
                }
                previous => {
                    state.pending = Some(PendingEntry {
                        tag: tag.to_owned(),
                        message: message.to_owned(),
                        level,
                        count: 1,
                        last_timestamp_millis: now,
                    });
                    previous
                }
            };
            self.rearm(&mut state);
            previous
        };
        if let Some(entry) = flushed {
            (self.shared.on_flush)(entry);
        }
    }

    /// Emit the pending slot immediately, cancelling the armed timer.
    /// No-op when the buffer is empty.
    pub fn flush(&self) {
        let flushed = {
            let mut state = self.shared.state.lock();
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            state.generation += 1;
            state.pending.take()
        };
        if let Some(entry) = flushed {
            (self.shared.on_flush)(entry);
        }
    }

    /// Cancel the current timer, bump the generation, and arm a new timer
    /// bound to the fresh generation. Called with the state lock held.
    fn rearm(&self, state: &mut DedupState) {
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        state.generation += 1;
        let generation = state.generation;
        let weak = Arc::downgrade(&self.shared);
        state.timer = Some(self.scheduler.run_after_delay(
            self.silence_ms,
            Box::new(move || DedupShared::on_timer_fire(weak, generation)),
        ));
    }
}

impl Drop for DedupBuffer {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        state.generation += 1;
    }
}
