//! Platform defaults and environment variable names.
//!
//! Request tuning can be overridden via environment variables:
//! - `CF_SDK_REQUEST_TIMEOUT` - Optional. Request timeout in milliseconds. Defaults to `30000`.
//! - `CF_SDK_REQUEST_MAX_RETRIES` - Optional. Maximum attempts per request. Defaults to `5`.
//! - `CF_SDK_REQUEST_RETRY_DELAY` - Optional. Delay between attempts in milliseconds. Defaults to `1000`.
//!
//! Credentials and config location:
//! - `CF_API_KEY` - API key or JWT used by the env strategy.
//! - `CF_URL` - Platform base URL used by the env strategy.
//! - `CFCONFIG` - Overrides the `$HOME/.cfconfig` context file path.

use std::path::PathBuf;
use std::time::Duration;

/// Platform base URL used when none is provided.
pub const URL: &str = "https://g.codefresh.io";

/// Suffix appended to a context URL to reach the API root.
pub const API_SUFFIX: &str = "/api";

/// Suffix appended to a context URL to reach the OpenAPI document.
pub const SPEC_URL_SUFFIX: &str = "/api/openapi.json";

pub const CF_TOKEN_ENV: &str = "CF_API_KEY";
pub const CF_URL_ENV: &str = "CF_URL";
pub const CF_CONFIG_ENV: &str = "CFCONFIG";

/// When `DEBUG` starts with this pattern, transparent retries are disabled.
pub const DEBUG_PATTERN: &str = "codefresh";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Default OpenAPI document location.
pub fn spec_url() -> String {
    format!("{}{}", URL, SPEC_URL_SUFFIX)
}

/// Default context file: `$HOME/.cfconfig`.
pub fn config_path() -> PathBuf {
    home_dir().join(".cfconfig")
}

/// Per-user SDK directory: `$HOME/.Codefresh`.
pub fn codefresh_dir() -> PathBuf {
    home_dir().join(".Codefresh")
}

/// Directory holding the daily OpenAPI cache files.
pub fn spec_cache_dir() -> PathBuf {
    codefresh_dir().join("openapi-cache")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn timeout() -> Duration {
    Duration::from_millis(env_u64("CF_SDK_REQUEST_TIMEOUT", DEFAULT_TIMEOUT_MS))
}

pub fn max_attempts() -> u32 {
    env_u64("CF_SDK_REQUEST_MAX_RETRIES", u64::from(DEFAULT_MAX_ATTEMPTS))
        .try_into()
        .unwrap_or(DEFAULT_MAX_ATTEMPTS)
}

pub fn retry_delay() -> Duration {
    Duration::from_millis(env_u64("CF_SDK_REQUEST_RETRY_DELAY", DEFAULT_RETRY_DELAY_MS))
}

/// Whether debug mode is on (`DEBUG=codefresh*`).
pub fn debug_enabled() -> bool {
    std::env::var("DEBUG")
        .map(|v| v.starts_with(DEBUG_PATTERN))
        .unwrap_or(false)
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", name, value);
                default
            }
        },
        Err(_) => default,
    }
}
