//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AspectConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &AspectConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File {
        match &logging.file_path {
            None => {
                return Err(ConfigError::validation(
                    "logging.file_path is required when logging.output is 'file'",
                ));
            }
            Some(path) if path.file_name().is_none() => {
                return Err(ConfigError::validation(format!(
                    "logging.file_path must name a file: {}",
                    path.display()
                )));
            }
            Some(_) => {}
        }
    }

    for module in logging.filters.keys() {
        validate_filter_target(module)?;
    }

    Ok(())
}

/// Validates the target part of a filter directive.
fn validate_filter_target(module: &str) -> ConfigResult<()> {
    if module.is_empty() {
        return Err(ConfigError::validation("Filter module name cannot be empty"));
    }

    if module
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '=' | ',' | '[' | ']'))
    {
        return Err(ConfigError::validation(format!(
            "Invalid filter module name: {module}"
        )));
    }

    Ok(())
}
