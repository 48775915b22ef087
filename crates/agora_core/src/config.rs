//! Core runtime configuration.
//!
//! # Responsibility
//! - Load [`CoreConfig`] from a TOML file.
//! - Apply `AGORA_*` environment overrides on top of file values.
//!
//! # Invariants
//! - Every field has a default, so an empty file is a valid configuration.
//! - Unknown keys are rejected so typos surface instead of being ignored.

use crate::logging::default_log_level;
use crate::service::notification_service::TIME_BUFFER_MS;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "AGORA_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "AGORA_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "AGORA_LOG_DIR";
pub const ENV_NOTIFICATION_BUFFER_MS: &str = "AGORA_NOTIFICATION_BUFFER_MS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file; `None` keeps the database in memory.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute directory for rotated log files; `None` disables file logs.
    pub log_dir: Option<PathBuf>,
    pub notification_buffer_ms: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            notification_buffer_ms: TIME_BUFFER_MS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for `{key}`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl CoreConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()
    }

    /// Reads `path` and applies the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)?.with_env(std::env::vars())
    }

    /// Overrides fields from `AGORA_*` variables found in `vars`.
    pub fn with_env<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_DB_PATH => self.db_path = Some(PathBuf::from(value)),
                ENV_LOG_LEVEL => self.log_level = value,
                ENV_LOG_DIR => self.log_dir = Some(PathBuf::from(value)),
                ENV_NOTIFICATION_BUFFER_MS => {
                    self.notification_buffer_ms =
                        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                            key: ENV_NOTIFICATION_BUFFER_MS,
                            value: value.clone(),
                        })?;
                }
                _ => {}
            }
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.notification_buffer_ms < 0 {
            return Err(ConfigError::InvalidValue {
                key: "notification_buffer_ms",
                value: self.notification_buffer_ms.to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_LOG_LEVEL, ENV_NOTIFICATION_BUFFER_MS};
    use std::path::PathBuf;

    #[test]
    fn empty_file_yields_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.notification_buffer_ms, 180_000);
    }

    #[test]
    fn file_values_and_env_overrides_apply_in_order() {
        let config = CoreConfig::from_toml_str(
            "db_path = \"/var/lib/agora.db\"\nlog_level = \"warn\"\n",
        )
        .unwrap()
        .with_env(vec![
            (ENV_LOG_LEVEL.to_string(), "error".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ])
        .unwrap();

        assert_eq!(config.db_path, Some(PathBuf::from("/var/lib/agora.db")));
        assert_eq!(config.log_level, "error");
    }

    #[test]
    fn unknown_keys_and_bad_numbers_are_rejected() {
        assert!(matches!(
            CoreConfig::from_toml_str("db_pth = \"x\""),
            Err(ConfigError::Parse(_))
        ));
        let err = CoreConfig::default()
            .with_env(vec![(ENV_NOTIFICATION_BUFFER_MS.to_string(), "soon".to_string())])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
