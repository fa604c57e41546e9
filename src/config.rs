//! Client configuration parsed from environment variables.

use std::path::PathBuf;

use crate::net::api::HttpTimeouts;

pub const DEFAULT_API_URL: &str = "https://velo-backend-4pl2.onrender.com";
const STATE_DIR_NAME: &str = "velo";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid API URL '{0}' (expected http:// or https://)")]
    InvalidApiUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub state_dir: PathBuf,
    pub timeouts: HttpTimeouts,
}

impl ClientConfig {
    /// Build client config from environment variables.
    ///
    /// Optional:
    /// - `VELO_API_URL`: backend base URL, default [`DEFAULT_API_URL`]
    /// - `VELO_STATE_DIR`: where the session is kept, default
    ///   `$XDG_STATE_HOME/velo`, then `$HOME/.velo`, then `.velo`
    /// - `VELO_REQUEST_TIMEOUT_SECS`: no timeout when absent
    /// - `VELO_CONNECT_TIMEOUT_SECS`: no timeout when absent
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidApiUrl`] for a non-HTTP base URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = normalize_api_url(&std::env::var("VELO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()))?;
        let state_dir = env_non_empty("VELO_STATE_DIR").map_or_else(
            || default_state_dir(env_non_empty("XDG_STATE_HOME"), env_non_empty("HOME")),
            PathBuf::from,
        );
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("VELO_REQUEST_TIMEOUT_SECS"),
            connect_secs: env_parse_u64("VELO_CONNECT_TIMEOUT_SECS"),
        };

        Ok(Self { api_url, state_dir, timeouts })
    }

    /// Replace the base URL, e.g. from a command-line flag.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidApiUrl`] for a non-HTTP base URL.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = normalize_api_url(raw)?;
        Ok(self)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
}

fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidApiUrl(raw.to_string()))
    }
}

fn default_state_dir(xdg_state_home: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(xdg) = xdg_state_home {
        return PathBuf::from(xdg).join(STATE_DIR_NAME);
    }
    if let Some(home) = home {
        return PathBuf::from(home).join(format!(".{STATE_DIR_NAME}"));
    }
    PathBuf::from(format!(".{STATE_DIR_NAME}"))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
