pub mod backoff;
pub mod client;
pub mod connection;
pub mod error;
pub mod event;
pub mod metrics;
pub mod subscription;

pub use backoff::ReconnectConfig;
pub use backoff::ReconnectState;
pub use client::StreamClient;
pub use client::StreamConfig;
pub use connection::Connection;
pub use connection::ConnectionFactory;
pub use connection::Frame;
pub use connection::TungsteniteConnection;
pub use connection::TungsteniteFactory;
pub use connection::DEFAULT_HANDSHAKE_TIMEOUT;
pub use connection::DEFAULT_STREAM_URL;
pub use error::Result;
pub use error::StreamError;
pub use event::EventSink;
pub use event::StreamEvent;
pub use metrics::StreamStats;
pub use metrics::StreamStatsSnapshot;
pub use subscription::public_subscription;
pub use subscription::ConnectionId;
