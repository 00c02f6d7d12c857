use std::{env, fmt::Display, net::IpAddr, path::PathBuf, str::FromStr};

use chrono::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Directory holding the built frontend bundle.
    pub static_root: PathBuf,
    /// Postgres connection string. Only read with the `postgres` feature.
    pub database_url: Option<String>,
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            static_root: PathBuf::from("frontend/dist"),
            database_url: None,
            session_ttl: Duration::days(14),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` when a variable is set but does not
    /// parse. Unset variables fall back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: try_load("HOST", "127.0.0.1")?,
            port: try_load("PORT", "3000")?,
            static_root: try_load("STATIC_ROOT", "frontend/dist")?,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            session_ttl: Duration::hours(try_load("SESSION_TTL_HOURS", "336")?),
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_uses_default() {
        let port: u16 = try_load("TODOS_TEST_SURELY_UNSET_PORT", "4321").unwrap();
        assert_eq!(port, 4321);
    }

    #[test]
    fn unparseable_default_is_reported_with_key() {
        let err = try_load::<u16>("TODOS_TEST_SURELY_UNSET_PORT", "not-a-port").unwrap_err();
        let ConfigError::Invalid { key, value, .. } = err;
        assert_eq!(key, "TODOS_TEST_SURELY_UNSET_PORT");
        assert_eq!(value, "not-a-port");
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.session_ttl, Duration::hours(336));
        assert!(config.database_url.is_none());
    }
}
