//! # kx_ratelimit
//!
//! Call admission for the exchange API: a decaying per-account call budget
//! for private endpoints and a minimum-spacing gate for public ones.

pub mod budget;
pub mod error;
pub mod limiter;
pub mod public_gate;
pub mod tier;
mod time;

pub use budget::CallBudget;
pub use budget::CallBudgetBuilder;
pub use error::RateLimitError;
pub use error::Result;
pub use limiter::Admission;
pub use public_gate::PublicGate;
pub use public_gate::DEFAULT_PUBLIC_INTERVAL;
pub use tier::Tier;
pub use time::Clock;
pub use time::ManualClock;
pub use time::MonotonicClock;
