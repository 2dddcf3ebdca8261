use crate::core::config::{LOG_ENV, LogConfig, LogFormat};
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global tracing subscriber. `SOLVESTAT_LOG` wins over the
/// configured level; an unparsable filter falls back to `info`.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_tracing(config: &LogConfig) {
    let directive = std::env::var(LOG_ENV).unwrap_or_else(|_| config.level.clone());
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match config.format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Compact => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
