use std::io;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config_loader::LogSection;

/// Parse a level name, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    level.parse().unwrap_or(Level::INFO)
}

/// Initialise tracing with a non-blocking hourly file appender
///
/// `RUST_LOG` overrides `default_level`. Keep the returned guard alive for the
/// whole program or buffered lines are lost on exit.
pub fn init(app_name: &str, log_dir: &str, default_level: Level, stdout: bool) -> WorkerGuard {
    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::hourly(log_dir, format!("{app_name}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let file_layer =
        fmt::layer().with_writer(non_blocking).with_target(true).with_thread_names(true).with_line_number(true).with_ansi(false).compact();

    // Option<Layer> is itself a layer, so stdout can be switched off
    let stdout_layer = stdout.then(|| fmt::layer().with_writer(io::stdout).with_target(true).with_thread_names(true).with_ansi(true).compact());

    tracing_subscriber::registry().with(env_filter).with(file_layer).with(stdout_layer).init();

    guard
}

/// Initialise tracing from the `[log]` config section
pub fn init_from_config(app_name: &str, log: &LogSection) -> WorkerGuard {
    init(app_name, &log.dir, parse_level(&log.level), log.stdout)
}
