//! Tracing subscriber initialization.

use rampart_core::LoggingSettings;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to init subscriber: {reason}")]
    AlreadyInitialized { reason: String },
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Call once at
/// startup; a second call fails with [`TelemetryError::AlreadyInitialized`].
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&settings.filter)?,
    };

    let json_layer = settings
        .json
        .then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!settings.json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized {
            reason: e.to_string(),
        })?;

    tracing::info!(filter = %settings.filter, json = settings.json, "Tracing initialized");
    Ok(())
}

fn build_filter(filter: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}
