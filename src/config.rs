//! Startup configuration read from the environment.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::security::HashCost;

const MIN_SECRET_BYTES: usize = 32;
/// One year.
const MAX_TOKEN_TTL_MINUTES: u64 = 525_600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SECRET_KEY is not set")]
    MissingSecret,
    #[error("SECRET_KEY must be at least {min} bytes, got {len}")]
    WeakSecret { len: usize, min: usize },
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// HMAC signing key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret { len: bytes.len(), min: MIN_SECRET_BYTES });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret(<{} bytes redacted>)", self.0.len())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin").field("username", &self.username).field("email", &self.email).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub http_port: u16,
    /// JSON snapshot for the record store; in-memory only when `None`.
    pub data_file: Option<PathBuf>,
    pub secret: SigningSecret,
    pub token_ttl: Duration,
    pub hash_cost: HashCost,
    pub request_timeout: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

fn positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    at_most(name, value, u64::MAX)
}

fn at_most(name: &'static str, value: u64, max: u64) -> Result<u64, ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::Invalid { name, value: value.to_string() });
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name -> value source. Tests pass a map here.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = match lookup("SECRET_KEY") {
            Some(s) if !s.is_empty() => SigningSecret::new(s.into_bytes())?,
            _ => return Err(ConfigError::MissingSecret),
        };
        let ttl_minutes = at_most(
            "TIMESHEET_TOKEN_TTL_MINUTES",
            parsed(&lookup, "TIMESHEET_TOKEN_TTL_MINUTES", 30u64)?,
            MAX_TOKEN_TTL_MINUTES,
        )?;
        let timeout_secs =
            positive("TIMESHEET_REQUEST_TIMEOUT_SECS", parsed(&lookup, "TIMESHEET_REQUEST_TIMEOUT_SECS", 10u64)?)?;
        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parsed(&lookup, "TIMESHEET_ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            time_cost: parsed(&lookup, "TIMESHEET_ARGON2_TIME_COST", defaults.time_cost)?,
            parallelism: parsed(&lookup, "TIMESHEET_ARGON2_PARALLELISM", defaults.parallelism)?,
        };
        let bootstrap_admin = match (lookup("TIMESHEET_ADMIN_EMAIL"), lookup("TIMESHEET_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                username: lookup("TIMESHEET_ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
                email,
                password,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Invalid { name: "TIMESHEET_ADMIN_PASSWORD", value: String::new() })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Invalid { name: "TIMESHEET_ADMIN_EMAIL", value: String::new() })
            }
        };
        Ok(Self {
            bind: parsed(&lookup, "TIMESHEET_BIND", IpAddr::from([0, 0, 0, 0]))?,
            http_port: parsed(&lookup, "TIMESHEET_HTTP_PORT", 8000u16)?,
            data_file: lookup("TIMESHEET_DATA_FILE").filter(|p| !p.trim().is_empty()).map(PathBuf::from),
            secret,
            token_ttl: Duration::from_secs(ttl_minutes * 60),
            hash_cost,
            request_timeout: Duration::from_secs(timeout_secs),
            bootstrap_admin,
        })
    }
}
