use std::time::Duration;

use parking_lot::Mutex;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::Admission;
use crate::tier::Tier;
use crate::time::Clock;
use crate::time::MonotonicClock;
use crate::time::duration_to_nanos;

/// Decaying per-account call budget
///
/// Every admitted call adds its cost to a counter. The counter drains by one
/// unit per elapsed `decay_interval` and a call is only admitted while
/// `counter + cost` stays within the limit. Decay, check and increment run
/// under one lock so the budget can be shared between threads.
pub struct CallBudget<C: Clock = MonotonicClock> {
    state: Mutex<BudgetState>,

    /// Maximum number of units, `None` for an unbounded budget
    limit: Option<u32>,

    /// Nanoseconds for one unit to decay
    decay_nanos: u64,

    clock: C,
}

#[derive(Debug)]
struct BudgetState {
    counter: u32,
    last_update: u64,
}

impl CallBudget {
    /// Create a call budget measured against the wall clock
    pub fn new(limit: Option<u32>, decay_interval: Duration) -> Self {
        Self::with_clock(limit, decay_interval, MonotonicClock::new())
    }

    /// Create the budget an account of the given tier is granted
    pub fn for_tier(tier: Tier) -> Self {
        Self::new(tier.limit(), tier.decay_interval())
    }

    /// Create a builder for configuring a call budget
    pub fn builder() -> CallBudgetBuilder {
        CallBudgetBuilder::new()
    }
}

impl<C: Clock> CallBudget<C> {
    /// Create a call budget reading time from `clock`
    pub fn with_clock(limit: Option<u32>, decay_interval: Duration, clock: C) -> Self {
        assert!(!decay_interval.is_zero(), "Decay interval must be greater than 0");

        let now = clock.now_nanos();
        Self { state: Mutex::new(BudgetState { counter: 0, last_update: now }), limit, decay_nanos: duration_to_nanos(decay_interval), clock }
    }

    /// Drain the counter by the number of whole decay intervals elapsed
    #[inline(always)]
    fn decay_locked(&self, state: &mut BudgetState) {
        let now = self.clock.now_nanos();
        let elapsed = now.saturating_sub(state.last_update);
        let decayed = u32::try_from(elapsed / self.decay_nanos).unwrap_or(u32::MAX);

        state.counter = state.counter.saturating_sub(decayed);
        state.last_update = now;
    }

    /// Apply time-based decay without admitting anything
    pub fn decay(&self) {
        let mut state = self.state.lock();
        self.decay_locked(&mut state);
    }

    /// Decay, then admit a call of `cost` units if it fits the limit
    ///
    /// A rejected call leaves the counter untouched.
    pub fn admit(&self, cost: u32) -> Result<()> {
        let mut state = self.state.lock();
        self.decay_locked(&mut state);

        if let Some(limit) = self.limit {
            if state.counter.saturating_add(cost) > limit {
                tracing::debug!(counter = state.counter, limit, cost, "call budget exhausted");
                return Err(RateLimitError::BudgetExceeded { counter: state.counter, limit });
            }
        }

        state.counter = state.counter.saturating_add(cost);
        Ok(())
    }

    /// Units consumed as of the last decay, without decaying
    pub fn counter(&self) -> u32 {
        self.state.lock().counter
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn decay_interval(&self) -> Duration {
        Duration::from_nanos(self.decay_nanos)
    }
}

impl<C: Clock> Admission for CallBudget<C> {
    fn try_admit(&self, cost: u32) -> Result<()> {
        self.admit(cost)
    }

    fn available(&self) -> Option<u32> {
        let mut state = self.state.lock();
        self.decay_locked(&mut state);
        self.limit.map(|limit| limit.saturating_sub(state.counter))
    }

    fn reset(&self) {
        let now = self.clock.now_nanos();
        let mut state = self.state.lock();
        state.counter = 0;
        state.last_update = now;
    }
}

/// Builder for configuring a call budget
pub struct CallBudgetBuilder {
    limit: Option<u32>,
    decay_interval: Option<Duration>,
}

impl CallBudgetBuilder {
    /// Create a new builder with an unbounded limit
    pub fn new() -> Self {
        Self { limit: None, decay_interval: None }
    }

    /// Set the maximum number of budget units
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the time for one unit to decay
    pub fn decay_interval(mut self, interval: Duration) -> Self {
        self.decay_interval = Some(interval);
        self
    }

    /// Start from a tier preset
    pub fn tier(mut self, tier: Tier) -> Self {
        self.limit = tier.limit();
        self.decay_interval = Some(tier.decay_interval());
        self
    }

    /// Build the budget against the wall clock
    pub fn build(self) -> Result<CallBudget> {
        self.build_with_clock(MonotonicClock::new())
    }

    /// Build the budget against a custom clock
    pub fn build_with_clock<C: Clock>(self, clock: C) -> Result<CallBudget<C>> {
        let decay_interval = self.decay_interval.ok_or(RateLimitError::InvalidConfig("decay interval must be set"))?;
        if decay_interval.is_zero() {
            return Err(RateLimitError::InvalidConfig("decay interval must be greater than 0"));
        }
        Ok(CallBudget::with_clock(self.limit, decay_interval, clock))
    }
}

impl Default for CallBudgetBuilder {
    fn default() -> Self {
        Self::new()
    }
}
