//! # kx_app
//!
//! Shared plumbing for the exchange binaries: tracing, config files and
//! shutdown signalling.

pub mod cli;
pub mod config_loader;
pub mod shutdown_handler;
pub mod tracing_setup;

pub use config_loader::AppConfig;
