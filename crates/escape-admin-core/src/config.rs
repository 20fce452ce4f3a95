//! Configuration types for the admin console.
//!
//! This module provides the configuration structures that control where the
//! admin API lives, where the session is persisted, how long the H5P preview
//! waits for its player library, and which console features are enabled.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdminError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "escape-admin.json";

/// Default base URL of the admin API.
fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}

/// Default session file path.
fn default_session_file() -> String {
    ".escape-admin/session.json".to_string()
}

/// Default interval between library readiness checks, in milliseconds.
const fn default_poll_interval_ms() -> u64 {
    100
}

/// Default number of readiness checks before giving up.
const fn default_max_attempts() -> u32 {
    50
}

/// Default path of the H5P standalone player bundle on the server.
fn default_library_path() -> String {
    "/static/h5p-standalone/main.bundle.js".to_string()
}

/// Default directory for generated preview pages.
fn default_preview_output_dir() -> String {
    ".escape-admin/preview".to_string()
}

/// Default value for boolean options that default to true.
const fn default_true() -> bool {
    true
}

/// Main configuration for the admin console.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the REST backend (scheme, host and port).
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Path of the file that persists the auth token and user profile.
    #[serde(default = "default_session_file")]
    pub session_file: String,

    /// Optional per-request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,

    /// H5P preview loader settings.
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Feature switches.
    #[serde(default)]
    pub features: Features,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            session_file: default_session_file(),
            request_timeout_seconds: None,
            preview: PreviewConfig::default(),
            features: Features::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `escape-admin.json` in the current directory and falls back
    /// to defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON or
    /// invalid values.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            AdminError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `escape-admin.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON or
    /// invalid values.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `AdminError::ConfigValidationError` if the values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(AdminError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| AdminError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - `apiBase` must be an `http://` or `https://` URL
    /// - `sessionFile` must not be empty
    /// - `preview.pollIntervalMs` and `preview.maxAttempts` must be greater than 0
    ///
    /// # Errors
    ///
    /// Returns `AdminError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        match reqwest::Url::parse(&self.api_base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(AdminError::config_validation(
                    format!("apiBase '{}' is not an http(s) URL", self.api_base),
                    "Set apiBase to something like http://localhost:8000 in your escape-admin.json",
                ));
            }
        }

        if self.session_file.trim().is_empty() {
            return Err(AdminError::config_validation(
                "sessionFile must not be empty",
                "Provide a session file path in your escape-admin.json",
            ));
        }

        if self.preview.poll_interval_ms == 0 {
            return Err(AdminError::config_validation(
                "preview.pollIntervalMs must be greater than 0",
                "Set preview.pollIntervalMs to at least 1 in your escape-admin.json",
            ));
        }

        if self.preview.max_attempts == 0 {
            return Err(AdminError::config_validation(
                "preview.maxAttempts must be greater than 0",
                "Set preview.maxAttempts to at least 1 in your escape-admin.json",
            ));
        }

        Ok(())
    }

    /// Request timeout as a `Duration`, if configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

/// H5P preview loader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewConfig {
    /// Interval between readiness checks in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of checks before the loader gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Server path of the H5P standalone player bundle.
    #[serde(default = "default_library_path")]
    pub library_path: String,

    /// Directory where preview pages are written.
    #[serde(default = "default_preview_output_dir")]
    pub output_dir: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            library_path: default_library_path(),
            output_dir: default_preview_output_dir(),
        }
    }
}

impl PreviewConfig {
    /// Total time the loader waits for the library: interval × attempts.
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.saturating_mul(u64::from(self.max_attempts)))
    }
}

/// Feature switches replacing the separate console script versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Features {
    /// Teacher self-registration.
    #[serde(default = "default_true")]
    pub registration: bool,

    /// Registrations wait for approval by an existing teacher.
    #[serde(default)]
    pub registration_requires_approval: bool,

    /// Uploading `.h5p` packages as puzzles.
    #[serde(default = "default_true")]
    pub h5p_upload: bool,

    /// Previewing uploaded H5P content.
    #[serde(default = "default_true")]
    pub h5p_preview: bool,

    /// The students tab.
    #[serde(default = "default_true")]
    pub students: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            registration: default_true(),
            registration_requires_approval: false,
            h5p_upload: default_true(),
            h5p_preview: default_true(),
            students: default_true(),
        }
    }
}

impl Features {
    /// The first console iteration: login and room/puzzle management only.
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            registration: false,
            registration_requires_approval: false,
            h5p_upload: false,
            h5p_preview: false,
            students: false,
        }
    }

    /// Fails with `FeatureDisabled` unless `enabled` is set.
    pub(crate) fn require(enabled: bool, feature: &'static str) -> Result<()> {
        if enabled {
            Ok(())
        } else {
            Err(AdminError::FeatureDisabled { feature })
        }
    }
}
