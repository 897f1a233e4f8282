use std::time::Duration;

/// Reconnect schedule of a stream connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectConfig {
    /// Delay the schedule starts from and returns to after a successful connect
    pub initial_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,

    /// Failed attempts tolerated after the last successful connect
    pub max_retries: u32,

    /// Growth factor applied to the delay on every failure
    pub factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { initial_delay: Duration::from_millis(100), max_delay: Duration::from_secs(20), max_retries: 30, factor: std::f64::consts::E }
    }
}

/// Per-connection reconnect bookkeeping
#[derive(Debug, Clone)]
pub struct ReconnectState {
    config: ReconnectConfig,
    attempts: u32,
    delay: Duration,
}

impl ReconnectState {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempts: 0, delay: config.initial_delay }
    }

    /// A handshake succeeded: start the schedule over
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.delay = self.config.initial_delay;
    }

    /// Record a failed connect or a lost connection
    ///
    /// Returns the delay before the next attempt, or `None` once the failure
    /// count exceeds `max_retries`.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.config.max_retries {
            return None;
        }

        self.delay = self.delay.mul_f64(self.config.factor).min(self.config.max_delay);
        Some(self.delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn current_delay(&self) -> Duration {
        self.delay
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts > self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_retries: u32) -> ReconnectConfig {
        ReconnectConfig { initial_delay: Duration::from_millis(100), max_delay: Duration::from_millis(700), max_retries, factor: 2.0 }
    }

    #[test]
    fn test_delay_grows_to_cap() {
        let mut state = ReconnectState::new(config(10));

        let delays: Vec<_> = (0..5).map(|_| state.on_failure().unwrap()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(700),
                Duration::from_millis(700),
                Duration::from_millis(700)
            ]
        );
        assert_eq!(state.attempts(), 5);
    }

    #[test]
    fn test_exhausted_after_max_retries() {
        let mut state = ReconnectState::new(config(3));

        assert!(state.on_failure().is_some());
        assert!(state.on_failure().is_some());
        assert!(state.on_failure().is_some());
        assert!(!state.is_exhausted());
        assert!(state.on_failure().is_none());
        assert!(state.is_exhausted());
    }

    #[test]
    fn test_connect_resets_schedule() {
        let mut state = ReconnectState::new(config(3));
        state.on_failure();
        state.on_failure();

        state.on_connected();
        assert_eq!(state.attempts(), 0);
        assert_eq!(state.current_delay(), Duration::from_millis(100));
        assert_eq!(state.on_failure(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_zero_retries() {
        let mut state = ReconnectState::new(config(0));
        assert!(state.on_failure().is_none());
    }

    #[test]
    fn test_default_schedule() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_retries, 30);
        assert_eq!(config.max_delay, Duration::from_secs(20));

        let mut state = ReconnectState::new(config);
        let first = state.on_failure().unwrap();
        assert!(first > Duration::from_millis(270) && first < Duration::from_millis(275));
    }
}
