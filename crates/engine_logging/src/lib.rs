#![deny(missing_docs)]
//! Logging shared by the harvester crates.
//!
//! Library code logs through the `engine_*` macros; the binary decides where
//! records go. [`harvest_config`] mutes the HTTP stack's own records.

use simplelog::{Config, ConfigBuilder};

/// Log targets whose records are dropped by [`harvest_config`].
pub const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "wiremock"];

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// simplelog configuration with thread ids shown and [`QUIET_TARGETS`] muted.
pub fn harvest_config() -> Config {
    let mut builder = ConfigBuilder::new();
    builder.set_thread_level(log::LevelFilter::Debug);
    for &target in QUIET_TARGETS {
        builder.add_filter_ignore_str(target);
    }
    builder.build()
}

/// Initializes a terminal logger for tests.
///
/// No-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        harvest_config(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
