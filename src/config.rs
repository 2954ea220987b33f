// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BACKEND_URL` | Base URL of the hosted identity/table service | Required for the hosted backend |
//! | `BACKEND_ANON_KEY` | Public API key sent as the `apikey` header | Required for the hosted backend |
//! | `APP_URL` | Public origin; OAuth callback is `{APP_URL}/auth/callback` | `https://U-fresher.vercel.app` |
//! | `ADMIN_CODE` | Shared-secret elevation code | `Createrkkrishavya` |
//! | `PROFILES_TABLE` | Table holding profile records | `profiles` |
//! | `SESSION_REFRESH_MARGIN_SECS` | Refresh access tokens this long before expiry | `60` |
//! | `SESSION_FILE` | JSON file mirroring the current session between runs | Unset (memory only) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |
//!
//! Blank values are treated as unset.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::logging::LogFormat;

/// Environment variable name for the hosted service base URL.
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";

/// Environment variable name for the hosted service public API key.
pub const BACKEND_ANON_KEY_ENV: &str = "BACKEND_ANON_KEY";

/// Environment variable name for the public app origin.
pub const APP_URL_ENV: &str = "APP_URL";

/// Environment variable name for the admin elevation code.
pub const ADMIN_CODE_ENV: &str = "ADMIN_CODE";

/// Environment variable name for the profile table.
pub const PROFILES_TABLE_ENV: &str = "PROFILES_TABLE";

/// Environment variable name for the token refresh margin, in seconds.
pub const SESSION_REFRESH_MARGIN_ENV: &str = "SESSION_REFRESH_MARGIN_SECS";

/// Environment variable name for the session mirror file.
pub const SESSION_FILE_ENV: &str = "SESSION_FILE";

/// Environment variable name for the log format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Public origin the deployed client is served from.
pub const DEFAULT_APP_URL: &str = "https://U-fresher.vercel.app";

/// Elevation code accepted when `ADMIN_CODE` is unset.
///
/// Shipped with every client build, so it only gates casual access.
pub const DEFAULT_ADMIN_CODE: &str = "Createrkkrishavya";

pub const DEFAULT_PROFILES_TABLE: &str = "profiles";

pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Connection settings for the hosted service.
#[derive(Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` when neither `BACKEND_URL` nor `BACKEND_ANON_KEY` is set.
    pub backend: Option<BackendConfig>,
    pub app_url: Url,
    pub admin_code: String,
    pub profiles_table: String,
    pub refresh_margin: Duration,
    pub session_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or_default = |name: &str, default: &str| {
            optional(name).unwrap_or_else(|| default.to_string())
        };

        let backend = match (optional(BACKEND_URL_ENV), optional(BACKEND_ANON_KEY_ENV)) {
            (None, None) => None,
            (Some(url), Some(anon_key)) => Some(BackendConfig {
                url: parse_url(BACKEND_URL_ENV, &url)?,
                anon_key,
            }),
            (None, Some(_)) => return Err(ConfigError::Missing(BACKEND_URL_ENV.to_string())),
            (Some(_), None) => {
                return Err(ConfigError::Missing(BACKEND_ANON_KEY_ENV.to_string()))
            }
        };

        let app_url = parse_url(APP_URL_ENV, &or_default(APP_URL_ENV, DEFAULT_APP_URL))?;

        let refresh_margin = match optional(SESSION_REFRESH_MARGIN_ENV) {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: SESSION_REFRESH_MARGIN_ENV.to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_REFRESH_MARGIN_SECS,
        };

        let log_format = match optional(LOG_FORMAT_ENV) {
            Some(raw) => LogFormat::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                name: LOG_FORMAT_ENV.to_string(),
                reason: format!("expected `json` or `pretty`, got `{raw}`"),
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            backend,
            app_url,
            admin_code: or_default(ADMIN_CODE_ENV, DEFAULT_ADMIN_CODE),
            profiles_table: or_default(PROFILES_TABLE_ENV, DEFAULT_PROFILES_TABLE),
            refresh_margin: Duration::from_secs(refresh_margin),
            session_file: optional(SESSION_FILE_ENV).map(PathBuf::from),
            log_format,
        })
    }

    /// Hosted service settings, or an error naming the missing variable.
    pub fn require_backend(&self) -> Result<&BackendConfig, ConfigError> {
        self.backend
            .as_ref()
            .ok_or_else(|| ConfigError::Missing(BACKEND_URL_ENV.to_string()))
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();

        assert!(config.backend.is_none());
        assert_eq!(config.app_url.as_str(), "https://u-fresher.vercel.app/");
        assert_eq!(config.admin_code, DEFAULT_ADMIN_CODE);
        assert_eq!(config.profiles_table, "profiles");
        assert_eq!(config.refresh_margin, Duration::from_secs(60));
        assert!(config.session_file.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[(ADMIN_CODE_ENV, "   "), (SESSION_FILE_ENV, "")]).unwrap();
        assert_eq!(config.admin_code, DEFAULT_ADMIN_CODE);
        assert!(config.session_file.is_none());
    }

    #[test]
    fn backend_needs_both_url_and_key() {
        let err = config_from(&[(BACKEND_URL_ENV, "https://db.example.com")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing(BACKEND_ANON_KEY_ENV.to_string()));

        let config = config_from(&[
            (BACKEND_URL_ENV, "https://db.example.com"),
            (BACKEND_ANON_KEY_ENV, "anon"),
        ])
        .unwrap();
        let backend = config.require_backend().unwrap();
        assert_eq!(backend.url.host_str(), Some("db.example.com"));
        assert_eq!(backend.anon_key, "anon");
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config_from(&[(SESSION_REFRESH_MARGIN_ENV, "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == SESSION_REFRESH_MARGIN_ENV));

        let err = config_from(&[(APP_URL_ENV, "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = config_from(&[(LOG_FORMAT_ENV, "xml")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn anon_key_is_redacted_in_debug() {
        let config = config_from(&[
            (BACKEND_URL_ENV, "https://db.example.com"),
            (BACKEND_ANON_KEY_ENV, "super-secret"),
        ])
        .unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
