use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use tracing::warn;

use crate::services::intake::DEFAULT_MAX_ATTACHMENTS;
use crate::services::uploads::MAX_UPLOAD_BYTES;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Service settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub listen_addr: SocketAddr,
    pub max_attachments: usize,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub credentials_path: Option<PathBuf>,
    pub is_production: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid value {:?} for {}: {}, using default", raw, key, e);
            default
        }),
        None => default,
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("COMPLAINT_API_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let default_addr = SocketAddr::from(([0, 0, 0, 0], 8080));
        let listen_addr = parse_or(&lookup, "LISTEN_ADDR", default_addr);
        let max_attachments = parse_or(&lookup, "MAX_ATTACHMENTS", DEFAULT_MAX_ATTACHMENTS);
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", MAX_UPLOAD_BYTES);
        let timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let credentials_path = lookup("ADMIN_CREDENTIALS_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let is_production = lookup("ENVIRONMENT")
            .map(|val| val.to_lowercase() == "production")
            .unwrap_or(false);

        Self {
            api_base_url,
            listen_addr,
            max_attachments,
            max_upload_bytes,
            request_timeout: Duration::from_secs(timeout_secs),
            credentials_path,
            is_production,
        }
    }
}
