//! Auth flow state machine and the login/register forms.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AdminError, Result};
use crate::models::{RegisterRequest, Role};

/// Minimum username length in characters.
pub const MIN_USERNAME_CHARS: usize = 3;

/// Minimum password length in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Longest password the server's hasher accepts, in UTF-8 bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

// ============================================================================
// AuthStatus
// ============================================================================

/// Where the console is in the sign-in lifecycle.
///
/// Allowed transitions:
/// - `LoggedOut` -> `LoggingIn` -> `LoggedIn` | `LoggedOut`
/// - `LoggedOut` -> `Registering` -> `LoggedOut`
/// - `LoggedOut` -> `LoggedIn` (restored session)
/// - `LoggedIn` -> `LoggedOut` (logout or rejected token)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// No session; the login screen is shown.
    #[default]
    LoggedOut,
    /// A login request is in flight.
    LoggingIn,
    /// A registration request is in flight.
    Registering,
    /// A teacher session is active; the dashboard is shown.
    LoggedIn,
}

impl AuthStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::LoggingIn => "logging_in",
            Self::Registering => "registering",
            Self::LoggedIn => "logged_in",
        }
    }

    /// Returns `true` if a request is in flight.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::LoggingIn | Self::Registering)
    }

    /// Returns `true` if moving to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::LoggedOut, Self::LoggingIn | Self::Registering | Self::LoggedIn)
                | (Self::LoggingIn, Self::LoggedIn | Self::LoggedOut)
                | (Self::Registering | Self::LoggedIn, Self::LoggedOut)
        )
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` and leaves the status unchanged if the
    /// move is not allowed.
    pub fn transition(&mut self, next: Self) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(AdminError::invalid_transition(*self, next));
        }
        debug!(from = %self, to = %next, "Auth status changed");
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Forms
// ============================================================================

/// Credentials entered on the login screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl LoginForm {
    /// Creates a filled-in form.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields must be filled in.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AdminError::validation(
                "credentials",
                "Please enter username and password",
            ));
        }
        Ok(())
    }
}

/// The teacher self-registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    /// Requested login name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Repeated password.
    pub confirm_password: String,
    /// Optional display name.
    pub full_name: Option<String>,
}

impl RegisterForm {
    /// Checks lengths and the confirmation. Lengths count characters, not
    /// bytes, except for the hasher's byte limit.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().chars().count() < MIN_USERNAME_CHARS {
            return Err(AdminError::validation(
                "username",
                format!("Username must be at least {MIN_USERNAME_CHARS} characters"),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AdminError::validation(
                "password",
                format!("Password must be at least {MIN_PASSWORD_CHARS} characters"),
            ));
        }
        if self.password.len() > MAX_PASSWORD_BYTES {
            return Err(AdminError::validation(
                "password",
                format!("Password is too long (max. {MAX_PASSWORD_BYTES} bytes)"),
            ));
        }
        if self.password != self.confirm_password {
            return Err(AdminError::validation(
                "confirm_password",
                "Passwords do not match",
            ));
        }
        Ok(())
    }

    /// Request body for a teacher account.
    #[must_use]
    pub fn to_request(&self) -> RegisterRequest<'_> {
        RegisterRequest {
            username: self.username.trim(),
            password: &self.password,
            full_name: self
                .full_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty()),
            role: Role::Teacher,
        }
    }
}

/// Result of a successful registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The account exists and can log in.
    Registered,
    /// The account exists but an administrator must approve it first.
    PendingApproval,
}

impl RegisterOutcome {
    /// Message shown to the user after registering.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Registered => "Registration successful. You can now log in.",
            Self::PendingApproval => {
                "Registration received. An administrator has to approve your account before you can log in."
            }
        }
    }
}
