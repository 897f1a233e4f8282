use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

/// Source of monotonic time for the admission controllers
///
/// Readings are nanoseconds relative to an arbitrary per-clock epoch, so only
/// differences between two readings of the same clock are meaningful.
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> u64;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    /// Epoch for relative time measurements
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a new clock with the current time as epoch
    #[inline(always)]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

/// Clock that only moves when told to
///
/// Clones share the same reading, so a test can hand one copy to a limiter
/// and keep another to drive time forward.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_to_nanos(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// Convert duration to nanoseconds, saturating at `u64::MAX`
#[inline(always)]
pub(crate) fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock() {
        let clock = MonotonicClock::new();
        let t1 = clock.now_nanos();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now_nanos();

        assert!(t2 > t1);
        assert!(t2 - t1 >= 10_000_000);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        assert_eq!(clock.now_nanos(), 0);

        handle.advance(Duration::from_millis(1500));
        assert_eq!(clock.now_nanos(), 1_500_000_000);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(duration_to_nanos(Duration::from_secs(1)), 1_000_000_000);
        assert_eq!(duration_to_nanos(Duration::MAX), u64::MAX);
    }
}
