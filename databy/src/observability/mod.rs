//! Logging initialisation and stage timing.

mod timing;

pub use timing::{StageSpanAttributes, StageTimer};

use crate::config::LoggingConfig;
use crate::errors::ConfigError;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.level` when set. Calling this
/// twice returns [`ConfigError::Logging`] instead of panicking.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|err| ConfigError::Logging(err.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|err| ConfigError::Logging(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_an_error() {
        let config = LoggingConfig::default();
        // The first call may already have happened in another test.
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(ConfigError::Logging(_))));
    }
}
