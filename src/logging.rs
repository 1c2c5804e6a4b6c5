//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application. [`init_tracing`] is a convenience for binaries and tests.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

use crate::error::LlmError;

/// Environment variable holding an `EnvFilter` directive, e.g. `confab=debug`.
pub const ENV_LOG: &str = "CONFAB_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global `fmt` subscriber.
///
/// The filter comes from `CONFAB_LOG`, falling back to `confab=info`.
/// An already installed subscriber is left in place.
pub fn init_tracing(format: LogFormat) -> Result<(), LlmError> {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("confab=info"));

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(ChronoUtc::rfc_3339())
            .with_target(true)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(ChronoUtc::rfc_3339())
            .with_target(true)
            .try_init(),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("already been set") => Ok(()),
        Err(e) => Err(LlmError::ConfigurationError(format!(
            "failed to initialize tracing: {e}"
        ))),
    }
}
