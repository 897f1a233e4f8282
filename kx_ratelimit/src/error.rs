use std::fmt;
use std::time::Duration;

/// Result type for call admission operations
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Errors that can occur while admitting a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// The account call budget has no room for the requested cost
    BudgetExceeded { counter: u32, limit: u32 },

    /// A public call arrived before the minimum spacing elapsed
    PublicRateExceeded { retry_after: Duration },

    /// Invalid configuration
    InvalidConfig(&'static str),
}

impl RateLimitError {
    /// True for the two rejection kinds, false for configuration errors
    pub fn is_rejection(&self) -> bool {
        matches!(self, RateLimitError::BudgetExceeded { .. } | RateLimitError::PublicRateExceeded { .. })
    }
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::BudgetExceeded { counter, limit } => {
                write!(f, "call rate limiter exceeded (counter={counter:02}, limit={limit:02})")
            }
            RateLimitError::PublicRateExceeded { retry_after } => {
                write!(f, "public call rate exceeded, retry after {retry_after:?}")
            }
            RateLimitError::InvalidConfig(msg) => write!(f, "Invalid rate limiter configuration: {}", msg),
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_message_is_zero_padded() {
        let err = RateLimitError::BudgetExceeded { counter: 5, limit: 20 };
        assert_eq!(err.to_string(), "call rate limiter exceeded (counter=05, limit=20)");
    }

    #[test]
    fn test_rejection_kinds() {
        assert!(RateLimitError::BudgetExceeded { counter: 1, limit: 1 }.is_rejection());
        assert!(RateLimitError::PublicRateExceeded { retry_after: Duration::from_millis(10) }.is_rejection());
        assert!(!RateLimitError::InvalidConfig("tier").is_rejection());
    }
}
