use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const API_KEY_VAR: &str = "SCRAPER_API_KEY";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9111;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_DOCUMENT_BYTES: usize = 20_000_000;

#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub api_key: String,
    pub fetch: FetchConfig,
}

/// Limits applied to the outbound page fetch.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_document_bytes: usize,
    pub user_agent: String,
    /// Honour `HTTP(S)_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            user_agent: default_user_agent(),
            use_system_proxy: true,
        }
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_addr", &self.server_addr)
            .field("api_key", &"<redacted>")
            .field("fetch", &self.fetch)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigError(format!("{} environment variable is not set", API_KEY_VAR))
            })?;

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        let timeout = parse_or(&lookup, "FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;
        let connect_timeout =
            parse_or(&lookup, "CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;
        if timeout == 0 || connect_timeout == 0 {
            return Err(AppError::ConfigError(
                "Fetch timeouts must be greater than zero".to_string(),
            ));
        }

        let max_document_bytes =
            parse_or(&lookup, "MAX_DOCUMENT_BYTES", DEFAULT_MAX_DOCUMENT_BYTES)?;
        let user_agent = lookup("SCRAPER_USER_AGENT")
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(default_user_agent);
        let use_system_proxy = parse_or(&lookup, "FETCH_USE_PROXY", true)?;

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            api_key,
            fetch: FetchConfig {
                timeout: Duration::from_secs(timeout),
                connect_timeout: Duration::from_secs(connect_timeout),
                max_document_bytes,
                user_agent,
                use_system_proxy,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
