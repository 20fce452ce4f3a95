//! Error types for the escape room admin console.
//!
//! This module defines the error hierarchy for all console operations,
//! including configuration loading, client-side validation, session storage,
//! HTTP calls to the admin API, and H5P preview loading.

use std::path::PathBuf;

/// A specialized `Result` type for admin console operations.
pub type Result<T> = std::result::Result<T, AdminError>;

/// Errors that can occur while driving the admin console.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your escape-admin.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Client-side Validation Errors
    // ========================================================================
    /// A form failed client-side validation; no request was sent.
    #[error("{field}: {message}")]
    Validation {
        /// The form field that failed validation.
        field: &'static str,
        /// Human-readable description of the failure.
        message: String,
    },

    /// A puzzle operation was attempted without a selected room.
    #[error("No room selected\n\nSuggestion: Select a room first (pass --room <ROOM_ID>)")]
    NoRoomSelected,

    /// The requested feature is switched off in the configuration.
    #[error("Feature '{feature}' is disabled\n\nSuggestion: Enable features.{feature} in your escape-admin.json")]
    FeatureDisabled {
        /// Config key of the disabled feature.
        feature: &'static str,
    },

    // ========================================================================
    // Authentication Errors
    // ========================================================================
    /// The server accepted the credentials but the account is not a teacher.
    #[error("Only teachers can sign in to the admin console (account role: {role})")]
    NotTeacher {
        /// The role reported by the server.
        role: String,
    },

    /// Login was rejected by the server.
    #[error("Login failed\n\nSuggestion: Check your username and password")]
    LoginFailed,

    /// An authenticated call was made without a session.
    #[error("Not logged in\n\nSuggestion: Run 'escape-admin login' first")]
    NotLoggedIn,

    /// The server rejected the stored token; the session has been cleared.
    #[error("Session expired or invalid\n\nSuggestion: Run 'escape-admin login' again")]
    SessionExpired,

    // ========================================================================
    // API Errors
    // ========================================================================
    /// The admin API answered with a non-success status.
    #[error("API error {status} on {endpoint}{}", detail_suffix(.detail))]
    Api {
        /// The endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// The server's `detail` message, when it sent one.
        detail: Option<String>,
    },

    /// Transport-level HTTP failure (connection refused, TLS, decoding).
    #[error("HTTP error: {0}\n\nSuggestion: Check that the server at apiBase is reachable")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // Session Storage Errors
    // ========================================================================
    /// The session file could not be read or written.
    #[error("Session storage error at '{path}': {message}\n\nSuggestion: Check permissions or remove the session file")]
    SessionStorage {
        /// Path to the session file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // H5P Preview Errors
    // ========================================================================
    /// The H5P player library did not become available in time.
    #[error("H5P library not available after {waited_ms}ms\n\nSuggestion: Check that the H5P standalone bundle is served at preview.libraryPath")]
    PreviewLibraryTimeout {
        /// How long the loader waited, in milliseconds.
        waited_ms: u64,
    },

    /// The viewer failed to mount the content.
    #[error("H5P preview failed: {0}")]
    Preview(String),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid auth state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl AdminError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Validation` error for a form field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Creates a new `Api` error.
    #[must_use]
    pub fn api(endpoint: impl Into<String>, status: u16, detail: Option<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            status,
            detail,
        }
    }

    /// Creates a new `SessionStorage` error.
    #[must_use]
    pub fn session_storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SessionStorage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns the HTTP status for API errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this error was raised before any network call.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NoRoomSelected | Self::FeatureDisabled { .. }
        )
    }

    /// Returns `true` if the error means the user has to log in (again).
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::NotLoggedIn | Self::SessionExpired | Self::LoginFailed | Self::NotTeacher { .. }
        ) || matches!(self, Self::Api { status: 401, .. })
    }

    /// Returns `true` if this error is fatal and the CLI should not continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::SessionStorage { .. }
        )
    }
}
