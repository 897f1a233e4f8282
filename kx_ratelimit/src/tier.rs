//! Account tier presets
//!
//! The exchange grants each verification tier a call budget that fills up by
//! the cost of every private call and drains by one unit per decay interval.
//! Ledger and trade-history queries cost two units, everything else one.

use std::time::Duration;

use crate::error::RateLimitError;
use crate::error::Result;

/// Account verification tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    /// Call budget disabled
    Unlimited,
    /// Starter: 15 units, down by one every three seconds
    Starter,
    /// Intermediate: 20 units, down by one every two seconds
    #[default]
    Intermediate,
    /// Pro: 20 units, down by one every second
    Pro,
}

impl Tier {
    /// Map the exchange's numeric tier level (0 disables the limiter)
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Tier::Unlimited),
            2 => Ok(Tier::Starter),
            3 => Ok(Tier::Intermediate),
            4 => Ok(Tier::Pro),
            _ => Err(RateLimitError::InvalidConfig("tier must be one of 0, 2, 3, 4")),
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Tier::Unlimited => 0,
            Tier::Starter => 2,
            Tier::Intermediate => 3,
            Tier::Pro => 4,
        }
    }

    /// Maximum budget units, `None` when unbounded
    pub fn limit(&self) -> Option<u32> {
        match self {
            Tier::Unlimited => None,
            Tier::Starter => Some(15),
            Tier::Intermediate | Tier::Pro => Some(20),
        }
    }

    /// Time for one budget unit to decay
    pub fn decay_interval(&self) -> Duration {
        match self {
            Tier::Unlimited | Tier::Starter => Duration::from_secs(3),
            Tier::Intermediate => Duration::from_secs(2),
            Tier::Pro => Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_round_trip() {
        for level in [0, 2, 3, 4] {
            assert_eq!(Tier::from_level(level).unwrap().level(), level);
        }
    }

    #[test]
    fn test_unknown_level_rejected() {
        assert!(matches!(Tier::from_level(1), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(Tier::from_level(5), Err(RateLimitError::InvalidConfig(_))));
    }

    #[test]
    fn test_tier_parameters() {
        assert_eq!(Tier::Unlimited.limit(), None);
        assert_eq!(Tier::Starter.limit(), Some(15));
        assert_eq!(Tier::Starter.decay_interval(), Duration::from_secs(3));
        assert_eq!(Tier::Intermediate.limit(), Some(20));
        assert_eq!(Tier::Intermediate.decay_interval(), Duration::from_secs(2));
        assert_eq!(Tier::Pro.limit(), Some(20));
        assert_eq!(Tier::Pro.decay_interval(), Duration::from_secs(1));
        assert_eq!(Tier::default(), Tier::Intermediate);
    }
}
