//! Process configuration loaded from `.env` and the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::withdrawal::WithdrawalPolicy;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Base URL the client core talks to.
    pub backend_url: String,
    pub api_token: Option<String>,
    /// Upper bound on every backend round-trip.
    pub request_timeout: Duration,
    /// redb directory; in-memory ledger when unset
    pub data_path: Option<String>,
    pub withdrawal: WithdrawalPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            data_path: None,
            withdrawal: WithdrawalPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (after `.env`, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let policy = defaults.withdrawal.clone();

        let timeout_ms: u64 = parse_or(&lookup, "LEDGER_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;

        let withdrawal = WithdrawalPolicy {
            min_amount: parse_or(&lookup, "WITHDRAW_MIN", policy.min_amount)?,
            max_amount: parse_or(&lookup, "WITHDRAW_MAX", policy.max_amount)?,
            open_time: time_or(&lookup, "WITHDRAW_OPEN_TIME", policy.open_time)?,
            close_time: time_or(&lookup, "WITHDRAW_CLOSE_TIME", policy.close_time)?,
            utc_offset_minutes: parse_or(&lookup, "WITHDRAW_UTC_OFFSET_MINUTES", policy.utc_offset_minutes)?,
        };
        if withdrawal.min_amount > withdrawal.max_amount {
            return Err(ConfigError::Invalid {
                key: "WITHDRAW_MIN",
                value: withdrawal.min_amount.to_string(),
                reason: format!("exceeds WITHDRAW_MAX {}", withdrawal.max_amount),
            });
        }

        Ok(Self {
            bind_addr: parse_or(&lookup, "LEDGER_BIND_ADDR", defaults.bind_addr)?,
            backend_url: lookup("LEDGER_BACKEND_URL").unwrap_or(defaults.backend_url),
            api_token: lookup("LEDGER_API_TOKEN").filter(|t| !t.is_empty()),
            request_timeout: Duration::from_millis(timeout_ms),
            data_path: lookup("LEDGER_DATA_PATH").filter(|p| !p.is_empty()),
            withdrawal,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// `HH:MM`, zero padded (window checks compare these as strings).
fn time_or<F>(lookup: &F, key: &'static str, default: String) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value = raw.trim().to_string();
    if chrono::NaiveTime::parse_from_str(&value, "%H:%M").is_err() || value.len() != 5 {
        return Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected zero-padded HH:MM".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.withdrawal.min_amount, 1000);
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LEDGER_BIND_ADDR", "127.0.0.1:9000"),
            ("LEDGER_REQUEST_TIMEOUT_MS", "2500"),
            ("WITHDRAW_OPEN_TIME", "09:30"),
            ("WITHDRAW_CLOSE_TIME", "18:00"),
            ("LEDGER_API_TOKEN", ""),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.withdrawal.open_time, "09:30");
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_rejects_unpadded_time() {
        let err = AppConfig::from_lookup(lookup(&[("WITHDRAW_OPEN_TIME", "9:30")])).unwrap_err();
        assert!(err.to_string().contains("WITHDRAW_OPEN_TIME"));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let result = AppConfig::from_lookup(lookup(&[("WITHDRAW_MIN", "5000"), ("WITHDRAW_MAX", "100")]));
        assert!(result.is_err());
    }
}
