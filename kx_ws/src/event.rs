use crossbeam_channel::Sender;
use serde_json::Value;
use serde_json::json;

/// What a subscriber observes on a stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A decoded text frame, in receipt order
    Message(Value),

    /// Automatic reconnection was abandoned; delivered once, nothing follows
    ReconnectExhausted,
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::ReconnectExhausted)
    }

    /// JSON form of the event; the terminal event maps to a fixed error payload
    pub fn into_value(self) -> Value {
        match self {
            StreamEvent::Message(value) => value,
            StreamEvent::ReconnectExhausted => json!({ "e": "error", "m": "Max reconnect retries reached" }),
        }
    }
}

/// Destination of a subscription's events
///
/// Callbacks run on the stream client's event-loop thread; a slow callback
/// delays every other connection, so heavy work belongs behind a channel.
pub enum EventSink {
    Callback(Box<dyn FnMut(StreamEvent) + Send>),
    Channel(Sender<StreamEvent>),
}

impl EventSink {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnMut(StreamEvent) + Send + 'static,
    {
        EventSink::Callback(Box::new(f))
    }

    pub fn channel(sender: Sender<StreamEvent>) -> Self {
        EventSink::Channel(sender)
    }

    pub(crate) fn deliver(&mut self, event: StreamEvent) {
        match self {
            EventSink::Callback(callback) => callback(event),
            EventSink::Channel(sender) => {
                if sender.send(event).is_err() {
                    tracing::debug!("Subscriber dropped its receiver, discarding event");
                }
            }
        }
    }
}
