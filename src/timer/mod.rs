//! Timing primitives: wall clock and one-shot delayed callbacks
//!
//! Both interfaces are injectable so that tests can drive time by hand:
//!
//! - `Clock` supplies epoch milliseconds; monotonicity is not required
//! - `DelayScheduler` arms a single cancellable callback after a delay
//!
//! `ThreadScheduler` is the production scheduler. Each armed timer gets a
//! dedicated named thread parked on a condition variable; cancelling sets
//! a flag and wakes the thread. Cancellation strictly before the callback
//! starts suppresses it, cancellation afterwards is a no-op, and repeated
//! cancels are idempotent.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};

/// Wall-clock time source.
pub trait Clock: Send + Sync {
    /// Current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// Handle to an armed timer.
pub trait Cancellable: Send {
    /// Prevent the callback from running if it has not started yet.
    /// Idempotent; a no-op once the callback has begun.
    fn cancel(&self);
}

/// One-shot delayed callback scheduler.
pub trait DelayScheduler: Send + Sync {
    /// Run `block` after roughly `delay_ms` milliseconds unless the
    /// returned handle is cancelled first.
    fn run_after_delay(
        &self,
        delay_ms: u64,
        block: Box<dyn FnOnce() + Send>,
    ) -> Box<dyn Cancellable>;
}

struct TimerSignal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

struct TimerHandle {
    signal: Arc<TimerSignal>,
}

impl Cancellable for TimerHandle {
    fn cancel(&self) {
        let mut cancelled = self.signal.cancelled.lock();
        *cancelled = true;
        self.signal.condvar.notify_one();
    }
}

/// Scheduler that backs each armed timer with one named thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl DelayScheduler for ThreadScheduler {
    fn run_after_delay(
        &self,
        delay_ms: u64,
        block: Box<dyn FnOnce() + Send>,
    ) -> Box<dyn Cancellable> {
        let signal = Arc::new(TimerSignal {
            cancelled: Mutex::new(false),
            condvar: Condvar::new(),
        });
        let thread_signal = signal.clone();

        thread::Builder::new()
            .name("klog-silence-timer".to_string())
            .spawn(move || {
                let deadline = Instant::now() + Duration::from_millis(delay_ms);
                let mut cancelled = thread_signal.cancelled.lock();
                while !*cancelled {
                    if thread_signal
                        .condvar
                        .wait_until(&mut cancelled, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                // The lock is held from wakeup through this check, so a
                // cancel cannot slip in between the check and the call.
                if *cancelled {
                    return;
                }
                drop(cancelled);
                block();
            })
            .expect("Failed to spawn timer thread");

        Box::new(TimerHandle { signal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callback_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let scheduler = ThreadScheduler;
        let _handle = scheduler.run_after_delay(
            10,
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_before_fire_suppresses() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let scheduler = ThreadScheduler;
        let handle = scheduler.run_after_delay(
            200,
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handle.cancel();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let scheduler = ThreadScheduler;
        let handle = scheduler.run_after_delay(50, Box::new(|| {}));

        handle.cancel();
        handle.cancel();
        handle.cancel();
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let scheduler = ThreadScheduler;
        let handle = scheduler.run_after_delay(
            10,
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        thread::sleep(Duration::from_millis(100));
        handle.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_system_clock_is_plausible() {
        let clock = SystemClock;
        // Some time in 2020 or later
        assert!(clock.now_millis() > 1_577_836_800_000);
    }
}
