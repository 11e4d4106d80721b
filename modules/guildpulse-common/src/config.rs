use std::env;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use tracing::info;

use crate::error::ConfigError;
use crate::file_config::{DatabaseConfig, DispatchConfig, FileConfig};

/// Effective configuration: the file's settings with environment overrides
/// and secrets applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    /// `GUILDPULSE_DB_PASSWORD`
    pub database_password: Option<String>,
    /// `DATABASE_URL`. When set it replaces every `[database]` connection field.
    pub database_url: Option<String>,
}

impl Config {
    /// Apply process environment variables on top of `file`.
    pub fn from_env(file: FileConfig) -> Result<Self, ConfigError> {
        Self::from_lookup(file, |key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(
        file: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut database = file.database;
        if let Some(host) = lookup("GUILDPULSE_DB_HOST") {
            database.host = host;
        }
        if let Some(port) = lookup("GUILDPULSE_DB_PORT") {
            database.port = parse_var("GUILDPULSE_DB_PORT", &port)?;
        }
        if let Some(name) = lookup("GUILDPULSE_DB_NAME") {
            database.name = name;
        }
        if let Some(user) = lookup("GUILDPULSE_DB_USER") {
            database.user = user;
        }

        let config = Self {
            database,
            dispatch: file.dispatch,
            database_password: lookup("GUILDPULSE_DB_PASSWORD").filter(|p| !p.is_empty()),
            database_url: lookup("DATABASE_URL").filter(|u| !u.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database_url.is_none() && self.database.host.trim().is_empty() {
            return Err(ConfigError::Missing(
                "database.host (or DATABASE_URL)".to_string(),
            ));
        }
        if self.dispatch.query_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "dispatch.query_timeout_secs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection options for the event store pool.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.database_url {
            // The URL carries credentials; keep it out of the error.
            return PgConnectOptions::from_str(url)
                .map_err(|_| ConfigError::Invalid("DATABASE_URL is not a valid Postgres URL".to_string()));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.database.host)
            .port(self.database.port)
            .database(&self.database.name)
            .username(&self.database.user);
        if let Some(password) = &self.database_password {
            options = options.password(password);
        }
        Ok(options)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.database.acquire_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.dispatch.retry_backoff_ms)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.dispatch.query_timeout_secs.map(Duration::from_secs)
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        let source = if self.database_url.is_some() {
            "DATABASE_URL"
        } else {
            "config"
        };
        let password = if self.database_password.is_some() {
            "[set]"
        } else {
            "[unset]"
        };
        info!(
            source,
            host = %self.database.host,
            port = self.database.port,
            database = %self.database.name,
            user = %self.database.user,
            password,
            max_connections = self.database.max_connections,
            max_retries = self.dispatch.max_retries,
            retry_backoff_ms = self.dispatch.retry_backoff_ms,
            query_timeout_secs = ?self.dispatch.query_timeout_secs,
            "Configuration loaded"
        );
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} has an invalid value: {value:?}")))
}
