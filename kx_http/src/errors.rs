use kx_ratelimit::RateLimitError;
use thiserror::Error;

/// Failures of a single transport attempt
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {}", .messages.join(", "))]
    ApiError { messages: Vec<String> },

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl HttpError {
    /// Whether resubmitting the same request can succeed
    ///
    /// Missing credentials are a local misconfiguration and fail every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, HttpError::AuthenticationFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// Outcome of a throttled, retried call
///
/// The two kinds are never converted into each other: a caller can always
/// tell local budget exhaustion from a failure on the remote side.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("{0}")]
    BudgetExceeded(#[source] RateLimitError),

    #[error("remote call failed: {0}")]
    RemoteTransient(#[source] HttpError),
}

impl CallError {
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, CallError::BudgetExceeded(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, CallError::RemoteTransient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message() {
        let err = HttpError::ApiError { messages: vec!["EGeneral:Invalid arguments".into(), "EQuery:Unknown asset pair".into()] };
        assert_eq!(err.to_string(), "API error: EGeneral:Invalid arguments, EQuery:Unknown asset pair");
    }

    #[test]
    fn test_retryable() {
        assert!(HttpError::InvalidResponse("HTTP 502".into()).is_retryable());
        assert!(HttpError::ApiError { messages: vec![] }.is_retryable());
        assert!(!HttpError::AuthenticationFailed("no signer".into()).is_retryable());
    }

    #[test]
    fn test_call_error_kinds_are_distinct() {
        let budget = CallError::BudgetExceeded(RateLimitError::BudgetExceeded { counter: 20, limit: 20 });
        let remote = CallError::RemoteTransient(HttpError::InvalidResponse("HTTP 500".into()));

        assert!(budget.is_budget_exceeded() && !budget.is_remote());
        assert!(remote.is_remote() && !remote.is_budget_exceeded());
        assert_eq!(budget.to_string(), "call rate limiter exceeded (counter=20, limit=20)");
        assert_eq!(remote.to_string(), "remote call failed: Invalid response: HTTP 500");
    }
}
