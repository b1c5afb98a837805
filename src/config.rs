//! Service configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `127.0.0.1` |
//! | `PORT` | `8080` |
//! | `DATABASE_PATH` | `tasks.db` (`:memory:` for an in-memory database) |
//! | `RATE_LIMIT_MAX_REQUESTS` | `100` |
//! | `RATE_LIMIT_WINDOW_SECONDS` | `60` |
//! | `RATE_LIMIT_TRUST_FORWARDED` | `false` |
//! | `RECONCILE_INTERVAL_SECONDS` | `60` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::limiter::RateLimitConfig;
use crate::reconciler::DEFAULT_RECONCILE_INTERVAL;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub rate_limit: RateLimitConfig,
    /// Use `X-Forwarded-For` / `X-Real-IP` as the client identity when present.
    /// Only safe behind a proxy that overwrites these headers.
    pub trust_forwarded_for: bool,
    pub reconcile_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("tasks.db"),
            rate_limit: RateLimitConfig::default(),
            trust_forwarded_for: false,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unset or blank
    /// variables fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let max_requests = parse_var(&get, "RATE_LIMIT_MAX_REQUESTS")?
            .unwrap_or(defaults.rate_limit.max_requests);
        let window_secs = parse_var(&get, "RATE_LIMIT_WINDOW_SECONDS")?
            .unwrap_or(defaults.rate_limit.window.as_secs());
        let reconcile_secs = parse_var(&get, "RECONCILE_INTERVAL_SECONDS")?
            .unwrap_or(defaults.reconcile_interval.as_secs());

        non_zero("RATE_LIMIT_MAX_REQUESTS", u64::from(max_requests))?;
        non_zero("RATE_LIMIT_WINDOW_SECONDS", window_secs)?;
        non_zero("RECONCILE_INTERVAL_SECONDS", reconcile_secs)?;

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_var(&get, "PORT")?.unwrap_or(defaults.port),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            rate_limit: RateLimitConfig {
                max_requests,
                window: Duration::from_secs(window_secs),
            },
            trust_forwarded_for: parse_bool(&get, "RATE_LIMIT_TRUST_FORWARDED")?
                .unwrap_or(defaults.trust_forwarded_for),
            reconcile_interval: Duration::from_secs(reconcile_secs),
        })
    }
}

fn parse_var<T, G>(get: &G, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool<G>(get: &G, name: &'static str) -> Result<Option<bool>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name,
                value: raw.clone(),
                reason: "expected true or false".to_string(),
            }),
        })
        .transpose()
}

fn non_zero(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
