//! Layered configuration loading.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. [`AspectConfig::default`]
//! 2. Values handed to [`ConfigLoader::merge`]
//! 3. `aspect.toml` (or `aspect.yaml` / `aspect.yml` with `yaml-config`)
//! 4. The profile sibling of that file, e.g. `aspect.production.toml`
//! 5. `ASPECT_*` environment variables, nested with `__`
//!
//! `ASPECT_ENGINE__BEFORE_FAILURE=propagate` sets `engine.before_failure`.
//! `ASPECT_PROFILE` selects the profile and is not itself a setting.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/aspect.toml")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::schema::AspectConfig;

const FILE_STEM: &str = "aspect";
const ENV_PREFIX: &str = "ASPECT_";
const PROFILE_VAR: &str = "ASPECT_PROFILE";

// =============================================================================
// Profile
// =============================================================================

/// Selects the profile-specific file merged over the base file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    /// Any other name, stored lowercase.
    Named(String),
}

impl Profile {
    /// Parses a profile name. `dev` and `prod` are shorthands.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "dev" | "development" => Self::Development,
            "prod" | "production" => Self::Production,
            _ => Self::Named(name),
        }
    }

    /// The name used in file names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Named(name) => name,
        }
    }

    /// Reads `ASPECT_PROFILE`.
    pub fn from_env() -> Self {
        match std::env::var(PROFILE_VAR) {
            Ok(name) if !name.trim().is_empty() => Self::parse(&name),
            _ => Self::default(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// File formats
// =============================================================================

/// A configuration file format compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    /// Formats tried during discovery, in order.
    const ENABLED: &'static [FileFormat] = &[
        #[cfg(feature = "toml-config")]
        FileFormat::Toml,
        #[cfg(feature = "yaml-config")]
        FileFormat::Yaml,
    ];

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    fn merge(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// A file to merge, with the format it is parsed as.
#[derive(Debug)]
struct Layer {
    path: PathBuf,
    format: FileFormat,
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Builds an [`AspectConfig`] from defaults, files and the environment.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    explicit_file: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the working directory and the user
    /// config directory, with the profile taken from `ASPECT_PROFILE`.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            explicit_file: None,
            use_env: true,
        }
    }

    /// Overrides the profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search. Once any is added, the default
    /// directories are no longer searched.
    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    /// Adds `<config dir>/aspect` to the searched directories.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(FILE_STEM)),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    /// Ignores `ASPECT_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Layers `config` over the built-in defaults, below files and environment.
    pub fn merge(mut self, config: AspectConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Merges every source and extracts the result.
    pub fn load(self) -> ConfigResult<AspectConfig> {
        let layers = self.layers()?;

        let mut figment = Figment::from(Serialized::defaults(AspectConfig::default()))
            .merge(self.overrides);
        for layer in &layers {
            info!(path = %layer.path.display(), "Loading configuration file");
            figment = layer.format.merge(figment, &layer.path);
        }
        if self.use_env {
            trace!(prefix = ENV_PREFIX, "Merging environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        let config: AspectConfig = figment.extract()?;
        debug!(
            profile = %self.profile,
            files = layers.len(),
            level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Resolves the files to merge, base file first.
    fn layers(&self) -> ConfigResult<Vec<Layer>> {
        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            let format = FileFormat::of(path).ok_or_else(|| {
                ConfigError::ParseError(format!(
                    "unsupported configuration file format: {}",
                    path.display()
                ))
            })?;
            return Ok(vec![Layer {
                path: path.clone(),
                format,
            }]);
        }

        let dirs = self.search_dirs();
        for dir in &dirs {
            if let Some(layers) = self.discover_in(dir) {
                return Ok(layers);
            }
        }
        debug!(dirs = ?dirs, "No configuration file found, using defaults");
        Ok(Vec::new())
    }

    /// Finds the base file in `dir` and its profile sibling, if any.
    fn discover_in(&self, dir: &Path) -> Option<Vec<Layer>> {
        FileFormat::ENABLED.iter().find_map(|&format| {
            format.extensions().iter().find_map(|ext| {
                let base = dir.join(format!("{FILE_STEM}.{ext}"));
                if !base.is_file() {
                    return None;
                }
                let mut layers = vec![Layer { path: base, format }];
                let sibling = dir.join(format!("{FILE_STEM}.{}.{ext}", self.profile));
                if sibling.is_file() {
                    layers.push(Layer {
                        path: sibling,
                        format,
                    });
                }
                Some(layers)
            })
        })
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(FILE_STEM)))
            .collect()
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<AspectConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, plus environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<AspectConfig> {
    ConfigLoader::new().file(path.as_ref()).load()
}

#[cfg(test)]
mod tests {
    use aspect_core::BeforeFailure;
    use figment::Jail;

    use super::*;
    use crate::config::schema::{LogLevel, LogOutput};

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config, AspectConfig::default());
            Ok(())
        });
    }

    #[test]
    fn profile_names() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_VAR, "prod");
            assert_eq!(Profile::from_env(), Profile::Production);
            jail.set_env(PROFILE_VAR, " ");
            assert_eq!(Profile::from_env(), Profile::Development);
            Ok(())
        });
        assert_eq!(Profile::parse("Staging"), Profile::Named("staging".into()));
        assert_eq!(Profile::parse("Staging").to_string(), "staging");
    }

    #[test]
    fn missing_explicit_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/aspect.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn programmatic_values_sit_below_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("ASPECT_LOGGING__LEVEL", "trace");

            let mut base = AspectConfig::default();
            base.logging.level = LogLevel::Warn;
            base.engine.trace_invocations = true;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(base)
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Trace);
            assert!(config.engine.trace_invocations);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn file_profile_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "aspect.toml",
                r#"
                [engine]
                before_failure = "propagate"

                [logging]
                level = "warn"
                output = "stderr"
                "#,
            )?;
            jail.create_file(
                "aspect.production.toml",
                r#"
                [logging]
                level = "error"
                "#,
            )?;
            jail.set_env("ASPECT_ENGINE__TRACE_INVOCATIONS", "true");

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.engine.before_failure, BeforeFailure::Propagate);
            assert!(config.engine.trace_invocations);
            assert_eq!(config.logging.level, LogLevel::Error);
            assert_eq!(config.logging.output, LogOutput::Stderr);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn profile_file_alone_is_ignored() {
        Jail::expect_with(|jail| {
            jail.create_file("aspect.production.toml", "[logging]\nlevel = \"error\"\n")?;

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Info);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn bad_value_is_a_parse_error() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[logging]\nlevel = \"loud\"\n")?;
            let result = ConfigLoader::new().file("custom.toml").without_env().load();
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[test]
    fn unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("aspect.ini", "level = debug")?;
            let result = ConfigLoader::new().file("aspect.ini").load();
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }
}
