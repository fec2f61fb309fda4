//! Application-level configuration loading: retry tuning, listing limits and identity header.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PICKUP_GAMES_CONFIG_PATH";
const DEFAULT_IDENTITY_HEADER: &str = "x-authenticated-user";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Conflict and unavailability retry tuning for membership changes.
    pub retry: RetryConfig,
    /// Defaults and limits for category listings.
    pub listing: ListingConfig,
    /// Header carrying the caller's principal, set by the fronting gateway.
    pub identity_header: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Retry budget used by the membership coordinator.
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_unavailable_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 20,
            max_delay_ms: 500,
            max_unavailable_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Listing window and page limits.
pub struct ListingConfig {
    pub lookback_days: u32,
    pub default_max_results: usize,
    pub max_results_cap: usize,
}

impl ListingConfig {
    /// How far back a listing reaches when the caller gives no `since`.
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(u64::from(self.lookback_days) * 24 * 60 * 60)
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            lookback_days: 14,
            default_max_results: 10,
            max_results_cap: 100,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        max_attempts = app_config.retry.max_attempts,
                        identity_header = %app_config.identity_header,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            listing: ListingConfig::default(),
            identity_header: DEFAULT_IDENTITY_HEADER.to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    retry: RetryConfig,
    listing: ListingConfig,
    identity_header: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let identity_header = value
            .identity_header
            .map(|header| header.trim().to_ascii_lowercase())
            .filter(|header| !header.is_empty())
            .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_owned());

        Self {
            retry: value.retry,
            listing: value.listing,
            identity_header,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.listing.default_max_results, 10);
        assert_eq!(config.identity_header, "x-authenticated-user");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_json(
            r#"{"retry": {"maxAttempts": 8}, "listing": {"lookbackDays": 30}, "identityHeader": "X-User-Email"}"#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.retry.base_delay_ms, 20);
        assert_eq!(config.listing.lookback(), Duration::from_secs(30 * 86_400));
        assert_eq!(config.listing.max_results_cap, 100);
        assert_eq!(config.identity_header, "x-user-email");
    }

    #[test]
    fn blank_identity_header_falls_back() {
        let config = AppConfig::from_json(r#"{"identityHeader": "  "}"#).unwrap();
        assert_eq!(config.identity_header, DEFAULT_IDENTITY_HEADER);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(AppConfig::from_json(r#"{"retry": {"maxAttempts": "many"}}"#).is_err());
    }
}
