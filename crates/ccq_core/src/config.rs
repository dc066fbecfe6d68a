//! Configuration loading and validation.
//!
//! # Responsibility
//! - Read the JSON configuration file (or the bundled default).
//! - Validate it once, so downstream code only sees valid values.
//! - Resolve per-user config/data locations.
//!
//! # Invariants
//! - A `Configuration` value can only be obtained through validation.
//! - Validation never panics; every rejection is a `ConfigError`.

use crate::logging::normalize_level;
use directories::BaseDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use url::Url;

/// Directory name used beneath the user's config/data directories.
pub const APP_DIR_NAME: &str = "ccq";
const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "ccq.sqlite3";
const LOG_DIR_NAME: &str = "logs";
const URN_PREFIX: &str = "ctp:";
const DEFAULT_CONFIG_JSON: &str = include_str!("../config.default.json");

/// One configured book: a title and the urns of its sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntry {
    pub title: String,
    pub urns: Vec<String>,
}

/// Database location settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to `<data dir>/ccq/ccq.sqlite3`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfiguration {
    api_url: String,
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    books: Vec<BookEntry>,
}

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    api_url: Url,
    database: DatabaseConfig,
    log_level: Option<&'static str>,
    books: Vec<BookEntry>,
}

/// Reasons a configuration is rejected.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidApiUrl(String),
    BlankDatabasePath,
    InvalidLogLevel(String),
    BlankBookTitle {
        index: usize,
    },
    EmptyUrns {
        title: String,
    },
    InvalidUrn {
        title: String,
        urn: String,
    },
    /// No home directory could be determined for default locations.
    NoHomeDirectory,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read configuration `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed configuration: {err}"),
            Self::InvalidApiUrl(value) => {
                write!(f, "apiUrl `{value}` is not a valid http(s) URL")
            }
            Self::BlankDatabasePath => write!(f, "database.path must not be blank"),
            Self::InvalidLogLevel(message) => write!(f, "invalid logLevel: {message}"),
            Self::BlankBookTitle { index } => write!(f, "books[{index}].title must not be blank"),
            Self::EmptyUrns { title } => write!(f, "book `{title}` has no urns"),
            Self::InvalidUrn { title, urn } => write!(
                f,
                "book `{title}` has urn `{urn}` not starting with `{URN_PREFIX}`"
            ),
            Self::NoHomeDirectory => write!(f, "could not locate the user's home directory"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl Configuration {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfiguration = serde_json::from_str(json)?;
        Self::validate(raw)
    }

    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        info!(
            "event=config_load module=config status=ok source=file books={}",
            config.books.len()
        );
        Ok(config)
    }

    /// Loads `<config dir>/ccq/config.json`, or the bundled default when the
    /// user has no configuration file.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path()?;
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::bundled()?;
        info!(
            "event=config_load module=config status=ok source=bundled books={}",
            config.books.len()
        );
        Ok(config)
    }

    /// The configuration shipped with the binary.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json(DEFAULT_CONFIG_JSON)
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn books(&self) -> &[BookEntry] {
        &self.books
    }

    /// Normalized log level, if configured.
    pub fn log_level(&self) -> Option<&'static str> {
        self.log_level
    }

    /// The SQLite file to use: the configured path or the per-user default.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_data_dir()?.join(DB_FILE_NAME)),
        }
    }

    fn validate(raw: RawConfiguration) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(&raw.api_url)?;

        if let Some(path) = &raw.database.path {
            if path.as_os_str().to_string_lossy().trim().is_empty() {
                return Err(ConfigError::BlankDatabasePath);
            }
        }

        let log_level = raw
            .log_level
            .as_deref()
            .map(normalize_level)
            .transpose()
            .map_err(ConfigError::InvalidLogLevel)?;

        for (index, book) in raw.books.iter().enumerate() {
            validate_book(index, book)?;
        }

        Ok(Self {
            api_url,
            database: raw.database,
            log_level,
            books: raw.books,
        })
    }
}

/// `<config dir>/ccq/config.json` for the current user.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(base_dirs
        .config_dir()
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

/// `<data dir>/ccq` for the current user.
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(base_dirs.data_dir().join(APP_DIR_NAME))
}

/// `<data dir>/ccq/logs` for the current user.
pub fn default_log_dir() -> Result<PathBuf, ConfigError> {
    Ok(app_data_dir()?.join(LOG_DIR_NAME))
}

fn parse_api_url(value: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(value.trim()).map_err(|_| ConfigError::InvalidApiUrl(value.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidApiUrl(value.to_string()));
    }
    Ok(url)
}

fn validate_book(index: usize, book: &BookEntry) -> Result<(), ConfigError> {
    if book.title.trim().is_empty() {
        return Err(ConfigError::BlankBookTitle { index });
    }

    if book.urns.is_empty() {
        return Err(ConfigError::EmptyUrns {
            title: book.title.clone(),
        });
    }

    if let Some(urn) = book.urns.iter().find(|urn| !urn.starts_with(URN_PREFIX)) {
        return Err(ConfigError::InvalidUrn {
            title: book.title.clone(),
            urn: urn.clone(),
        });
    }

    Ok(())
}
