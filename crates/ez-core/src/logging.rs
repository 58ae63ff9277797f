#![forbid(unsafe_code)]

//! Logging facade.
//!
//! With the `tracing` feature enabled the `ez_*!` macros forward to
//! [`tracing`]; without it they expand to nothing, so call sites in this crate
//! need no `cfg` of their own.
//!
//! With `tracing-json`, [`init_json_logging`] installs a JSON formatter whose
//! filter is read from [`LOG_ENV`].

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing as __tracing;

/// Environment variable holding `EnvFilter` directives (e.g. `ez_state=debug`).
pub const LOG_ENV: &str = "EZ_LOG";

/// Filter used when [`LOG_ENV`] is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Emit a `TRACE` event (no-op without the `tracing` feature).
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! ez_trace {
    ($($arg:tt)*) => { $crate::logging::__tracing::trace!($($arg)*) };
}

/// Emit a `TRACE` event (no-op without the `tracing` feature).
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! ez_trace {
    ($($arg:tt)*) => {};
}

/// Emit a `DEBUG` event (no-op without the `tracing` feature).
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! ez_debug {
    ($($arg:tt)*) => { $crate::logging::__tracing::debug!($($arg)*) };
}

/// Emit a `DEBUG` event (no-op without the `tracing` feature).
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! ez_debug {
    ($($arg:tt)*) => {};
}

/// Install a global JSON subscriber filtered by [`LOG_ENV`].
///
/// Fails if a global subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
}
