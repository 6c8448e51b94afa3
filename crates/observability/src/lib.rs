//! Tracing and logging setup shared by every binary embedding the engine.

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops. An invalid
/// configuration is reported and replaced by the defaults.
pub fn init() {
    let config = ObservabilityConfig::from_env().unwrap_or_else(|err| {
        eprintln!("invalid observability configuration ({err}); using defaults");
        ObservabilityConfig::default()
    });
    tracing::init(&config);
}

/// Environment-driven configuration.
pub mod config;

/// Tracing subscriber (filters, formatter).
pub mod tracing;

pub use config::{ConfigError, LogFormat, ObservabilityConfig};
