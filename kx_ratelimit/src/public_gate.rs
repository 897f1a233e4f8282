use std::time::Duration;

use parking_lot::Mutex;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::Admission;
use crate::time::Clock;
use crate::time::MonotonicClock;
use crate::time::duration_to_nanos;

/// Default spacing between public calls
pub const DEFAULT_PUBLIC_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum-spacing gate for unauthenticated endpoints
///
/// Public endpoints are policed per IP with no accumulating counter: a call is
/// admitted only if at least `min_interval` passed since the previous
/// admitted public call. Rejected calls do not move the reference point.
pub struct PublicGate<C: Clock = MonotonicClock> {
    /// Timestamp of the last admitted call in nanoseconds
    last_call: Mutex<Option<u64>>,

    /// Minimum spacing in nanoseconds, zero when the gate is disabled
    min_interval_nanos: u64,

    clock: C,
}

impl PublicGate {
    /// Create a gate measured against the wall clock
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, MonotonicClock::new())
    }

    /// A gate that admits every call
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Default for PublicGate {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_INTERVAL)
    }
}

impl<C: Clock> PublicGate<C> {
    /// Create a gate reading time from `clock`; a zero interval disables it
    pub fn with_clock(min_interval: Duration, clock: C) -> Self {
        Self { last_call: Mutex::new(None), min_interval_nanos: duration_to_nanos(min_interval), clock }
    }

    pub fn is_enabled(&self) -> bool {
        self.min_interval_nanos > 0
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_nanos(self.min_interval_nanos)
    }

    /// Admit a public call if the minimum spacing has elapsed
    pub fn admit(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let now = self.clock.now_nanos();
        let mut last_call = self.last_call.lock();

        if let Some(last) = *last_call {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.min_interval_nanos {
                let retry_after = Duration::from_nanos(self.min_interval_nanos - elapsed);
                tracing::debug!(?retry_after, "public call gate closed");
                return Err(RateLimitError::PublicRateExceeded { retry_after });
            }
        }

        *last_call = Some(now);
        Ok(())
    }
}

impl<C: Clock> Admission for PublicGate<C> {
    /// Public calls carry no cost; the gate only looks at spacing
    fn try_admit(&self, _cost: u32) -> Result<()> {
        self.admit()
    }

    fn available(&self) -> Option<u32> {
        if !self.is_enabled() {
            return None;
        }

        let now = self.clock.now_nanos();
        let open = match *self.last_call.lock() {
            Some(last) => now.saturating_sub(last) >= self.min_interval_nanos,
            None => true,
        };
        Some(u32::from(open))
    }

    fn reset(&self) {
        *self.last_call.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use crate::time::ManualClock;
    use super::*;

    fn gate() -> (PublicGate<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (PublicGate::with_clock(Duration::from_secs(1), clock.clone()), clock)
    }

    #[test]
    fn test_first_call_admitted() {
        let (gate, _clock) = gate();
        assert!(gate.admit().is_ok());
    }

    #[test]
    fn test_spaced_calls_admitted() {
        let (gate, clock) = gate();
        for _ in 0..5 {
            assert!(gate.admit().is_ok());
            clock.advance(Duration::from_millis(1_100));
        }

        assert!(gate.admit().is_ok());
        clock.advance(Duration::from_secs(1));
        assert!(gate.admit().is_ok());
    }

    #[test]
    fn test_close_calls_rejected() {
        let (gate, clock) = gate();
        assert!(gate.admit().is_ok());

        clock.advance(Duration::from_millis(400));
        let err = gate.admit().unwrap_err();
        assert_eq!(err, RateLimitError::PublicRateExceeded { retry_after: Duration::from_millis(600) });
    }

    #[test]
    fn test_rejection_keeps_reference_point() {
        let (gate, clock) = gate();
        assert!(gate.admit().is_ok());

        clock.advance(Duration::from_millis(600));
        assert!(gate.admit().is_err());

        // Measured from the admitted call, not the rejected one
        clock.advance(Duration::from_millis(400));
        assert!(gate.admit().is_ok());
    }

    #[test]
    fn test_disabled_gate() {
        let gate = PublicGate::disabled();
        assert!(!gate.is_enabled());
        for _ in 0..10 {
            assert!(gate.admit().is_ok());
        }
        assert_eq!(gate.available(), None);
    }

    #[test]
    fn test_available_and_reset() {
        let (gate, clock) = gate();
        assert_eq!(gate.available(), Some(1));

        assert!(gate.admit().is_ok());
        assert_eq!(gate.available(), Some(0));

        gate.reset();
        assert_eq!(gate.available(), Some(1));
        assert!(gate.admit().is_ok());

        clock.advance(Duration::from_secs(1));
        assert_eq!(gate.available(), Some(1));
    }

    #[test]
    fn test_default_interval() {
        let gate = PublicGate::default();
        assert_eq!(gate.min_interval(), DEFAULT_PUBLIC_INTERVAL);
        assert!(gate.admit().is_ok());
        assert!(gate.admit().is_err());
    }
}
