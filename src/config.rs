//! Shim configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ShimError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_INFO_PATH: &str = "/browserid/info/";
pub const DEFAULT_FAILURE_PARAM: &str = "bid_login_failed";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimConfig {
    /// Origin that relative endpoint URLs are resolved against.
    pub base_url: String,
    /// Path of the session info endpoint.
    pub info_path: String,
    /// Query parameter that marks a page reached after a failed login.
    pub failure_param: String,
    /// Fetch session info before `watch` so the widget learns the logged-in user.
    pub sync_logged_in_user: bool,
    pub timeouts: Timeouts,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            info_path: DEFAULT_INFO_PATH.to_string(),
            failure_param: DEFAULT_FAILURE_PARAM.to_string(),
            sync_logged_in_user: true,
            timeouts: Timeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        }
    }
}

impl ShimConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `BROWSERID_BASE_URL`: default `http://127.0.0.1:8000`
    /// - `BROWSERID_INFO_PATH`: default `/browserid/info/`
    /// - `BROWSERID_FAILURE_PARAM`: default `bid_login_failed`
    /// - `BROWSERID_SYNC_USER`: `true` (default) or `false`
    /// - `BROWSERID_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BROWSERID_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns `ShimError::Config` if a value is present but unparseable.
    pub fn from_env() -> Result<Self, ShimError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ShimConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ShimError::Config` if a value is present but unparseable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ShimError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("BROWSERID_BASE_URL")
            .unwrap_or(defaults.base_url)
            .trim_end_matches('/')
            .to_string();
        let info_path = lookup("BROWSERID_INFO_PATH").unwrap_or(defaults.info_path);
        let failure_param = lookup("BROWSERID_FAILURE_PARAM").unwrap_or(defaults.failure_param);
        if failure_param.is_empty() {
            return Err(ShimError::Config("BROWSERID_FAILURE_PARAM must not be empty".into()));
        }

        let sync_logged_in_user = match lookup("BROWSERID_SYNC_USER").as_deref() {
            None | Some("true" | "1") => true,
            Some("false" | "0") => false,
            Some(other) => {
                return Err(ShimError::Config(format!("invalid BROWSERID_SYNC_USER: {other}")));
            }
        };

        let timeouts = Timeouts {
            request_secs: parse_secs(&lookup, "BROWSERID_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_secs(&lookup, "BROWSERID_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { base_url, info_path, failure_param, sync_logged_in_user, timeouts })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ShimError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ShimError::Config(format!("invalid {key}: {raw}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
