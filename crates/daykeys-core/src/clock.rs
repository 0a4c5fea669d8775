//! Time source and the cancellable chord timer.
//!
//! The chord buffer does not run a background thread. The timer stores a
//! deadline against a [`Clock`]; the registry checks it on every keystroke and
//! on every buffer query. Tests drive a [`ManualClock`] instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond time source.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since construction, read from [`Instant`] so wall
/// clock adjustments cannot stretch a chord timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Single-shot deadline that can be armed, refreshed and cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChordTimer {
    deadline_ms: Option<u64>,
}

impl ChordTimer {
    /// Arm or refresh: the timer fires `timeout_ms` after `now_ms`.
    pub fn arm(&mut self, now_ms: u64, timeout_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(timeout_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// True once the deadline has been reached. A cancelled timer never fires.
    pub fn has_fired(&self, now_ms: u64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if now_ms >= deadline)
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(250);
        assert_eq!(other.now_ms(), 1_250);
        other.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn timer_fires_at_deadline() {
        let mut timer = ChordTimer::default();
        assert!(!timer.has_fired(u64::MAX));
        timer.arm(100, 500);
        assert!(!timer.has_fired(599));
        assert!(timer.has_fired(600));
    }

    #[test]
    fn refresh_pushes_deadline_out() {
        let mut timer = ChordTimer::default();
        timer.arm(0, 500);
        timer.arm(400, 500);
        assert!(!timer.has_fired(600));
        assert_eq!(timer.deadline_ms(), Some(900));
    }

    #[test]
    fn cancel_disarms() {
        let mut timer = ChordTimer::default();
        timer.arm(0, 10);
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.has_fired(1_000));
    }

    #[test]
    fn system_clock_never_goes_backwards() {
        let clock = SystemClock::new();
        let first = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now_ms();
        assert!(second >= first + 5);
    }
}
