use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::{elo, error::StartupError};

pub const DEFAULT_PORT: &str = "1111";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_STORE: &str = "redis";
pub const DEFAULT_K_FACTOR: &str = "32";
pub const DEFAULT_IP_RATE_LIMIT: &str = "30";
pub const DEFAULT_SESSION_RATE_LIMIT: &str = "20";
pub const DEFAULT_RATE_WINDOW_SECS: &str = "60";
pub const DEFAULT_RATE_HOUSEKEEPING_SECS: &str = "300";
pub const DEFAULT_RATE_GC_PROBABILITY: &str = "0.1";
pub const DEFAULT_TRUST_PROXY_HEADERS: &str = "false";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend {other:?}, expected redis or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub store: StoreBackend,
    pub k_factor: f64,
    pub ip_rate_limit: usize,
    pub session_rate_limit: usize,
    pub rate_window: Duration,
    pub housekeeping_interval: Duration,
    pub gc_probability: f64,
    /// Only turn on behind a reverse proxy that appends to `X-Forwarded-For`.
    pub trust_proxy_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            store: StoreBackend::Redis,
            k_factor: elo::DEFAULT_K_FACTOR,
            ip_rate_limit: 30,
            session_rate_limit: 20,
            rate_window: Duration::from_secs(60),
            housekeeping_interval: Duration::from_secs(300),
            gc_probability: 0.1,
            trust_proxy_headers: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, StartupError> {
        let config = Self {
            port: try_load("RUST_PORT", DEFAULT_PORT)?,
            redis_url: try_load("RUST_REDIS_URL", DEFAULT_REDIS_URL)?,
            store: try_load("RUST_STORE", DEFAULT_STORE)?,
            k_factor: try_load("RUST_ELO_K_FACTOR", DEFAULT_K_FACTOR)?,
            ip_rate_limit: try_load("RUST_IP_RATE_LIMIT", DEFAULT_IP_RATE_LIMIT)?,
            session_rate_limit: try_load("RUST_SESSION_RATE_LIMIT", DEFAULT_SESSION_RATE_LIMIT)?,
            rate_window: Duration::from_secs(try_load(
                "RUST_RATE_WINDOW_SECS",
                DEFAULT_RATE_WINDOW_SECS,
            )?),
            housekeeping_interval: Duration::from_secs(try_load(
                "RUST_RATE_HOUSEKEEPING_SECS",
                DEFAULT_RATE_HOUSEKEEPING_SECS,
            )?),
            gc_probability: try_load("RUST_RATE_GC_PROBABILITY", DEFAULT_RATE_GC_PROBABILITY)?,
            trust_proxy_headers: try_load(
                "RUST_TRUST_PROXY_HEADERS",
                DEFAULT_TRUST_PROXY_HEADERS,
            )?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if !self.k_factor.is_finite() || self.k_factor <= 0.0 {
            return Err(invalid("RUST_ELO_K_FACTOR", "must be a positive number"));
        }

        if !(0.0..=1.0).contains(&self.gc_probability) {
            return Err(invalid("RUST_RATE_GC_PROBABILITY", "must be between 0 and 1"));
        }

        if self.rate_window.is_zero() {
            return Err(invalid("RUST_RATE_WINDOW_SECS", "must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(key: &str, message: impl Display) -> StartupError {
    StartupError::Config {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("{key} not set, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, StartupError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            invalid(key, e)
        })
}
