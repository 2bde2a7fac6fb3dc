//! Subscriber installation.
//!
//! The engine logs through `tracing`: a `debug!` event per advised member
//! and, with `engine.trace_invocations`, an `advice` span around every advised
//! call. This module turns a [`LoggingConfig`] into a `tracing-subscriber`
//! registry with one formatting layer and an [`EnvFilter`].
//!
//! ```rust,ignore
//! LoggingBuilder::new()
//!     .with_level(LogLevel::Debug)
//!     .directive("aspect_framework=trace")
//!     .span_events(SpanEventConfig::LIFECYCLE)
//!     .try_init()?;
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Failure to install the subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// The log file or its directory could not be opened.
    #[error("Failed to open log file: {0}")]
    File(#[from] InitError),

    /// Another global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Installs a subscriber for `config`, keeping any subscriber already in place.
pub fn init_from_config(config: &LoggingConfig) {
    LoggingBuilder::from_config(config).init();
}

/// Configures and installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Per-module
/// directives are added on top of either.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    directives: Vec<String>,
    with_target: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::from_config(&LoggingConfig::default())
    }

    /// Starts from `config`, turning its `filters` into directives.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut directives: Vec<String> = config
            .filters
            .iter()
            .map(|(module, level)| format!("{module}={level}"))
            .collect();
        directives.sort();

        Self {
            config: config.clone(),
            directives,
            with_target: true,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Adds a filter directive such as `aspect_framework=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.config.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Writes to `path` and switches the output to [`LogOutput::File`].
    pub fn file(mut self, path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path.into());
        self.config.rotation = rotation;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.config.thread_ids = enabled;
        self
    }

    /// Includes source file and line in each event.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.config.file_location = enabled;
        self
    }

    /// Installs the subscriber, ignoring failures.
    pub fn init(self) {
        if let Err(e) = self.try_init() {
            eprintln!("aspect: logging not initialized: {e}");
        }
    }

    pub fn try_init(self) -> Result<(), LoggingError> {
        let layer = self.fmt_layer(self.writer()?);
        tracing_subscriber::registry()
            .with(layer)
            .with(self.filter())
            .try_init()?;
        Ok(())
    }

    fn filter(&self) -> EnvFilter {
        let default: LevelFilter = self.config.level.to_tracing_level().into();
        let mut filter = EnvFilter::builder()
            .with_default_directive(default.into())
            .from_env_lossy();

        for directive in &self.directives {
            match directive.parse::<Directive>() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("aspect: ignoring log directive {directive:?}: {e}"),
            }
        }
        filter
    }

    /// File output without a path falls back to stdout.
    fn writer(&self) -> Result<BoxMakeWriter, InitError> {
        Ok(match (self.config.output, &self.config.file_path) {
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                BoxMakeWriter::new(file_appender(path, self.config.rotation)?)
            }
            (LogOutput::Stdout, _) | (LogOutput::File, None) => {
                BoxMakeWriter::new(std::io::stdout)
            }
        })
    }

    fn fmt_layer(&self, writer: BoxMakeWriter) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(fmt_span(&self.config.span_events))
            .with_target(self.with_target)
            .with_thread_ids(self.config.thread_ids)
            .with_file(self.config.file_location)
            .with_line_number(self.config.file_location);

        match self.config.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

fn file_appender(path: &Path, rotation: LogRotation) -> Result<RollingFileAppender, InitError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "aspect.log".to_string());

    let rotation = match rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(name)
        .build(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_presets() {
        assert_eq!(fmt_span(&SpanEventConfig::NONE), FmtSpan::NONE);
        assert_eq!(
            fmt_span(&SpanEventConfig::LIFECYCLE),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(fmt_span(&SpanEventConfig::FULL), FmtSpan::FULL);
    }

    #[test]
    fn filters_become_sorted_directives() {
        let mut config = LoggingConfig::default();
        config.filters.insert("tower".into(), LogLevel::Warn);
        config.filters.insert("aspect_framework".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config).directive("figment=error");
        assert_eq!(
            builder.directives,
            ["aspect_framework=trace", "tower=warn", "figment=error"]
        );
    }

    #[test]
    fn file_output_without_path_uses_stdout() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        assert!(builder.writer().is_ok());
    }

    #[test]
    fn file_appender_in_temp_dir() {
        let path = std::env::temp_dir().join("aspect-logging-test.log");
        let builder = LoggingBuilder::new().file(&path, LogRotation::Daily);
        assert_eq!(builder.config.output, LogOutput::File);
        assert!(file_appender(&path, LogRotation::Never).is_ok());
    }
}
