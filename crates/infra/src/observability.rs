//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured level when set. Noisy transport
//! crates are capped at `warn`.

use heatmapp_domain::{HeatmappError, LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

const QUIET_TARGETS: [&str; 3] = ["hyper=warn", "reqwest=warn", "rustls=warn"];

/// Build the filter for `config`, honouring `RUST_LOG`.
///
/// # Errors
/// Returns `HeatmappError::Config` if the configured level is not a valid
/// filter directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, HeatmappError> {
    let mut filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|err| {
            HeatmappError::Config(format!("Invalid log level '{}': {err}", config.level))
        })?,
    };

    for directive in QUIET_TARGETS {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

/// Install the global tracing subscriber.
///
/// # Errors
/// Returns `HeatmappError::Config` for an invalid level and
/// `HeatmappError::Internal` if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), HeatmappError> {
    let registry = Registry::default().with(build_filter(config)?);

    let result = match config.format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    result.map_err(|err| HeatmappError::Internal(format!("tracing already initialised: {err}")))
}
