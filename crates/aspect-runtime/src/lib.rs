//! Aspect Runtime - configuration and logging for applications that advise
//! their members with Aspect.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`) with profiles and `ASPECT_` environment overrides
//! - Logging setup on top of `tracing-subscriber` (`LoggingBuilder`)
//! - A one-call [`bootstrap`] that loads, validates and installs both
//!
//! # Configuration File
//!
//! `aspect.toml` is searched in the working directory and in the user config
//! directory. With `ASPECT_PROFILE=dev`, `aspect.dev.toml` is merged on top.
//!
//! ```toml
//! [engine]
//! before_failure = "propagate"
//! trace_invocations = true
//!
//! [logging]
//! level = "debug"
//! span_events = { close = true }
//! filters = { aspect_framework = "trace" }
//! ```
//!
//! ```ignore
//! let config = aspect_runtime::bootstrap()?;
//! let transformer = before(log_call).with_options(config.engine.clone());
//! ```

pub mod config;
pub mod error;
pub mod logging;

use tracing::info;

// Re-exports
pub use config::{
    AspectConfig, ConfigError, ConfigLoader, ConfigResult, Profile, load_config,
    load_config_from_file, validate_config,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError, init_from_config};

pub use tracing;

/// Loads the configuration, validates it and installs the logging subscriber.
pub fn bootstrap() -> RuntimeResult<AspectConfig> {
    bootstrap_with(ConfigLoader::new())
}

/// Like [`bootstrap`], with a caller-provided loader.
pub fn bootstrap_with(loader: ConfigLoader) -> RuntimeResult<AspectConfig> {
    let config = loader.load()?;
    validate_config(&config)?;
    LoggingBuilder::from_config(&config.logging).try_init()?;
    info!(
        before_failure = ?config.engine.before_failure,
        trace_invocations = config.engine.trace_invocations,
        "Aspect runtime initialized"
    );
    Ok(config)
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{AspectConfig, ConfigLoader, LoggingConfig, Profile, SpanEventConfig};
    pub use crate::logging::LoggingBuilder;
    pub use crate::{bootstrap, load_config};
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn bootstrap_rejects_invalid_config_before_logging() {
        Jail::expect_with(|jail| {
            jail.set_env("ASPECT_LOGGING__OUTPUT", "file");

            let err = bootstrap_with(ConfigLoader::new().search_path(jail.directory()))
                .unwrap_err();
            assert!(matches!(
                err,
                RuntimeError::Config(ConfigError::ValidationError { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn bootstrap_surfaces_load_errors() {
        let err = bootstrap_with(ConfigLoader::new().file("/no/such/aspect.toml")).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(ConfigError::FileNotFound(_))));
    }
}
