//! Board configuration from `KANBAN_*` environment variables.
//!
//! # Responsibility
//! - Decode backend selection and tuning knobs with defaults.
//! - Build the configured persistence backend.
//!
//! # Invariants
//! - `remote` mode always carries an API url after validation.

use crate::db::DbError;
use crate::repo::backend::{BackendError, NoteBackend};
use crate::repo::http_backend::{HttpNoteBackend, DEFAULT_PER_PAGE};
use crate::repo::local_store::SqliteLocalStore;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "KANBAN_";

/// Which persistence backend the board talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Single-key SQLite store on this machine.
    #[default]
    Local,
    /// Remote notes REST API.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Base url of the notes API, e.g. `http://127.0.0.1:5000`.
    pub api_url: Option<String>,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<String>,
}

fn default_db_path() -> String {
    "kanban.sqlite3".into()
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            db_path: default_db_path(),
            api_url: None,
            per_page: default_per_page(),
            timeout_secs: default_timeout_secs(),
            log_level: None,
            log_dir: None,
        }
    }
}

/// Configuration decode/validation/bootstrap error.
#[derive(Debug)]
pub enum ConfigError {
    Env(envy::Error),
    Invalid(String),
    Storage(DbError),
    Backend(BackendError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(err) => write!(f, "invalid {ENV_PREFIX}* environment: {err}"),
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Env(err) => Some(err),
            Self::Invalid(_) => None,
            Self::Storage(err) => Some(err),
            Self::Backend(err) => Some(err),
        }
    }
}

impl BoardConfig {
    /// Reads and validates `KANBAN_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = envy::prefixed(ENV_PREFIX)
            .from_env::<Self>()
            .map_err(ConfigError::Env)?;
        config.validated()
    }

    /// Same as `from_env` over an explicit variable list.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Self>(vars)
            .map_err(ConfigError::Env)?;
        config.validated()
    }

    /// Normalizes blank strings and checks cross-field rules.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.api_url = non_blank(self.api_url);
        self.log_level = non_blank(self.log_level);
        self.log_dir = non_blank(self.log_dir);

        if self.backend == BackendKind::Remote && self.api_url.is_none() {
            return Err(ConfigError::Invalid(format!(
                "{ENV_PREFIX}API_URL is required when {ENV_PREFIX}BACKEND=remote"
            )));
        }
        if self.backend == BackendKind::Local && self.db_path.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{ENV_PREFIX}DB_PATH cannot be empty"
            )));
        }
        if self.per_page == 0 {
            return Err(ConfigError::Invalid(format!(
                "{ENV_PREFIX}PER_PAGE must be positive"
            )));
        }
        Ok(self)
    }

    /// Opens the configured backend.
    pub fn open_backend(&self) -> Result<Arc<dyn NoteBackend>, ConfigError> {
        match self.backend {
            BackendKind::Local => {
                let store = SqliteLocalStore::open(self.db_path.trim()).map_err(ConfigError::Storage)?;
                Ok(Arc::new(store))
            }
            BackendKind::Remote => {
                let url = self.api_url.as_deref().ok_or_else(|| {
                    ConfigError::Invalid(format!("{ENV_PREFIX}API_URL is not set"))
                })?;
                let backend = HttpNoteBackend::with_options(
                    url,
                    self.per_page,
                    Duration::from_secs(self.timeout_secs.max(1)),
                )
                .map_err(ConfigError::Backend)?;
                Ok(Arc::new(backend))
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, BoardConfig, ConfigError};

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn empty_environment_yields_local_defaults() {
        let config = BoardConfig::from_vars(Vec::new()).unwrap();
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.per_page, 1000);
    }

    #[test]
    fn remote_backend_requires_api_url() {
        let err = BoardConfig::from_vars(vars(&[("KANBAN_BACKEND", "remote")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("API_URL")));

        let config = BoardConfig::from_vars(vars(&[
            ("KANBAN_BACKEND", "remote"),
            ("KANBAN_API_URL", " http://127.0.0.1:5000 "),
            ("KANBAN_PER_PAGE", "50"),
        ]))
        .unwrap();
        assert_eq!(config.api_url.as_deref(), Some("http://127.0.0.1:5000"));
        assert_eq!(config.per_page, 50);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = BoardConfig::from_vars(vars(&[("KANBAN_BACKEND", "ftp")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn unprefixed_variables_are_ignored() {
        let config = BoardConfig::from_vars(vars(&[("BACKEND", "remote")])).unwrap();
        assert_eq!(config.backend, BackendKind::Local);
    }
}
