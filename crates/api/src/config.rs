//! Service settings
//!
//! Read from the process environment. A `.env` file in the working directory
//! is loaded first when present; variables already set in the environment
//! take precedence over it.

use config::{Config, Environment, Map};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

use history_storage::DatabaseConfig;

use crate::rate_limit::RateLimitConfig;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Service settings, one field per environment variable
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub postgres_user: String,
    pub postgres_password: String,
    /// Host, optionally with `:port`
    pub postgres_host: String,
    pub postgres_database: String,
    /// Full connection URL; overrides the `postgres_*` parts when set
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub query_timeout_ms: u64,
    pub bind_addr: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Enables per-IP rate limiting when set
    pub rate_limit_per_second: Option<u64>,
    pub rate_limit_burst: u32,
    /// `.env` file that was loaded, if any
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            postgres_user: "postgres".to_string(),
            postgres_password: String::new(),
            postgres_host: "localhost".to_string(),
            postgres_database: "postgres".to_string(),
            database_url: None,
            db_max_connections: 10,
            query_timeout_ms: 5_000,
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            rate_limit_per_second: None,
            rate_limit_burst: 10,
            env_file: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("database", &self.database().redacted_url())
            .field("db_max_connections", &self.db_max_connections)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .finish()
    }
}

impl Settings {
    /// Load `.env` from the working directory (if present) and then the
    /// process environment.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(Path::new(".env"))
    }

    /// Load an env file (if present) and then the process environment.
    /// Variables already set in the process are not overwritten by the file.
    pub fn load_from(env_file: &Path) -> Result<Self, SettingsError> {
        let loaded = dotenvy::from_path(env_file)
            .ok()
            .map(|_| env_file.to_path_buf());
        let mut settings = Self::from_source(None)?;
        settings.env_file = loaded;
        Ok(settings)
    }

    /// Build settings from an explicit variable map instead of the process
    /// environment. Keys use the environment spelling (`POSTGRES_HOST`).
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_source(Some(map))
    }

    fn from_source(vars: Option<Map<String, String>>) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(Environment::default().ignore_empty(true).source(vars))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        self.listen_addr()?;
        self.log_level()?;
        if self.db_max_connections == 0 {
            return Err(SettingsError::InvalidValue {
                key: "DB_MAX_CONNECTIONS",
                message: "must be at least 1".to_string(),
            });
        }
        if self.query_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue {
                key: "QUERY_TIMEOUT_MS",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.rate_limit_per_second == Some(0) {
            return Err(SettingsError::InvalidValue {
                key: "RATE_LIMIT_PER_SECOND",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Database configuration derived from the settings
    pub fn database(&self) -> DatabaseConfig {
        let base = match &self.database_url {
            Some(url) => DatabaseConfig {
                url: url.clone(),
                ..Default::default()
            },
            None => DatabaseConfig::postgres(
                &self.postgres_user,
                &self.postgres_password,
                &self.postgres_host,
                &self.postgres_database,
            ),
        };
        DatabaseConfig {
            max_connections: self.db_max_connections,
            query_timeout_ms: self.query_timeout_ms,
            ..base
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, SettingsError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| SettingsError::InvalidValue {
                key: "BIND_ADDR",
                message: format!("{}", e),
            })
    }

    pub fn log_level(&self) -> Result<Level, SettingsError> {
        self.log_level
            .parse()
            .map_err(|_| SettingsError::InvalidValue {
                key: "LOG_LEVEL",
                message: format!("unknown level '{}'", self.log_level),
            })
    }

    pub fn rate_limit(&self) -> Option<RateLimitConfig> {
        self.rate_limit_per_second.map(|rps| RateLimitConfig {
            requests_per_second: rps,
            burst_size: self.rate_limit_burst,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.rate_limit().is_none());
        assert_eq!(
            settings.database().url,
            "postgres://postgres@localhost/postgres"
        );
        assert_eq!(settings.listen_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_postgres_parts() {
        let settings = Settings::from_vars([
            ("POSTGRES_USER", "checkout"),
            ("POSTGRES_PASSWORD", "0123"),
            ("POSTGRES_HOST", "db:5433"),
            ("POSTGRES_DATABASE", "history"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("QUERY_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        let db = settings.database();
        assert_eq!(db.url, "postgres://checkout:0123@db:5433/history");
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.query_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_database_url_overrides_parts() {
        let settings = Settings::from_vars([
            ("POSTGRES_HOST", "ignored"),
            ("DATABASE_URL", "sqlite::memory:"),
        ])
        .unwrap();
        assert_eq!(settings.database().url, "sqlite::memory:");
    }

    #[test]
    fn test_server_and_logging() {
        let settings = Settings::from_vars([
            ("BIND_ADDR", "127.0.0.1"),
            ("PORT", "3000"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "json"),
            ("RATE_LIMIT_PER_SECOND", "5"),
            ("RATE_LIMIT_BURST", "20"),
        ])
        .unwrap();

        assert_eq!(settings.listen_addr().unwrap().to_string(), "127.0.0.1:3000");
        assert_eq!(settings.log_level().unwrap(), Level::DEBUG);
        assert_eq!(settings.log_format, LogFormat::Json);

        let limit = settings.rate_limit().unwrap();
        assert_eq!(limit.requests_per_second, 5);
        assert_eq!(limit.burst_size, 20);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let settings = Settings::from_vars([("RATE_LIMIT_PER_SECOND", "")]).unwrap();
        assert!(settings.rate_limit().is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Settings::from_vars([("PORT", "not-a-port")]).is_err());
        assert!(matches!(
            Settings::from_vars([("LOG_LEVEL", "loud")]),
            Err(SettingsError::InvalidValue { key: "LOG_LEVEL", .. })
        ));
        assert!(matches!(
            Settings::from_vars([("DB_MAX_CONNECTIONS", "0")]),
            Err(SettingsError::InvalidValue { key: "DB_MAX_CONNECTIONS", .. })
        ));
    }

    #[test]
    fn test_env_file_fills_unset_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "POSTGRES_DATABASE=from_env_file\nPOSTGRES_USER=file_user\n",
        )
        .unwrap();
        std::env::set_var("POSTGRES_USER", "process_user");

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.env_file.as_deref(), Some(path.as_path()));
        assert_eq!(settings.postgres_database, "from_env_file");
        assert_eq!(settings.postgres_user, "process_user");

        let missing = dir.path().join("absent.env");
        let settings = Settings::load_from(&missing).unwrap();
        assert!(settings.env_file.is_none());

        std::env::remove_var("POSTGRES_USER");
        std::env::remove_var("POSTGRES_DATABASE");
    }

    #[test]
    fn test_debug_hides_password() {
        let settings = Settings::from_vars([("POSTGRES_PASSWORD", "hunter2")]).unwrap();
        let printed = format!("{:?}", settings);
        assert!(!printed.contains("hunter2"));
    }
}
