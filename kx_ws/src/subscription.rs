use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use crate::error::Result;
use crate::error::StreamError;

/// Name of a stream connection, `{topic}_{primary_key}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
    pub fn new(topic: &str, primary_key: &str) -> Self {
        Self(Arc::from(format!("{topic}_{primary_key}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier and subscribe payload for a public channel
///
/// `subscription` is the channel object, e.g. `{"name": "ticker"}` or
/// `{"name": "book", "depth": 10}`; the identifier combines its name with the
/// first pair.
pub fn public_subscription(pairs: &[&str], subscription: Value) -> Result<(ConnectionId, String)> {
    let name = subscription
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StreamError::InvalidSubscription("subscription needs a string \"name\"".to_string()))?;
    let first = pairs.first().ok_or_else(|| StreamError::InvalidSubscription("at least one pair is required".to_string()))?;

    let id = ConnectionId::new(name, first);
    let payload = serde_json::to_string(&json!({ "event": "subscribe", "pair": pairs, "subscription": subscription }))?;
    Ok((id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id = ConnectionId::new("ticker", "XBT/USD");
        assert_eq!(id.as_str(), "ticker_XBT/USD");
        assert_eq!(id, ConnectionId::from("ticker_XBT/USD"));
        assert_eq!(id.to_string(), "ticker_XBT/USD");
    }

    #[test]
    fn test_public_subscription() {
        let (id, payload) = public_subscription(&["XBT/USD", "ETH/USD"], json!({"name": "book", "depth": 10})).unwrap();
        assert_eq!(id.as_str(), "book_XBT/USD");

        let payload: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(payload, json!({"event": "subscribe", "pair": ["XBT/USD", "ETH/USD"], "subscription": {"name": "book", "depth": 10}}));
    }

    #[test]
    fn test_invalid_subscriptions() {
        assert!(matches!(public_subscription(&["XBT/USD"], json!({"depth": 10})), Err(StreamError::InvalidSubscription(_))));
        assert!(matches!(public_subscription(&[], json!({"name": "ticker"})), Err(StreamError::InvalidSubscription(_))));
    }
}
