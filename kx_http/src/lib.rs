//! # kx_http
//!
//! REST access to the exchange: an operation catalogue, a retry policy that
//! wraps each call around the admission controllers of `kx_ratelimit`, and a
//! blocking reqwest transport.

pub mod client;
pub mod errors;
pub mod exchange;
pub mod operation;
pub mod retry;

pub use client::ExchangeTransport;
pub use client::HttpClientConfig;
pub use client::HttpTransport;
pub use client::RequestSigner;
pub use errors::CallError;
pub use errors::HttpError;
pub use errors::Result;
pub use exchange::ClientConfig;
pub use exchange::ExchangeClient;
pub use exchange::ServerTime;
pub use operation::ApiRequest;
pub use operation::CallClass;
pub use operation::Operation;
pub use retry::RetryPolicy;
