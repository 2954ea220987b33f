// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller-facing authentication errors.
//!
//! Every public lifecycle operation returns [`AuthResult`]. The `Display`
//! text of [`AuthError`] is the message shown to the user; library-internal
//! errors are logged where they occur and mapped onto these variants.

use serde::Serialize;

use crate::identity::IdentityError;

/// Authentication lifecycle error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Sign-up draft without email or password
    #[error("Email and password are required")]
    MissingCredentials,
    /// The identity backend refused the request or could not be reached
    #[error("{0}")]
    Backend(String),
    /// The backend accepted the request but returned no principal
    #[error("No user data returned")]
    NoUserData,
    /// Principal created, profile insert failed
    #[error("Account created but profile setup failed")]
    ProfileSetupFailed,
    /// Operation needs a published identity
    #[error("You must be signed in")]
    NotAuthenticated,
    /// Published identity lacks the required role
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
    /// Profile repository refused an edit
    #[error("Profile update failed")]
    ProfileUpdateFailed,
    /// Anything else; details are logged, not returned
    #[error("An unexpected error occurred")]
    Unexpected,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::Backend(_) => "backend_error",
            AuthError::NoUserData => "no_user_data",
            AuthError::ProfileSetupFailed => "profile_setup_failed",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::ProfileUpdateFailed => "profile_update_failed",
            AuthError::Unexpected => "unexpected_error",
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Rejected { message } => AuthError::Backend(message),
            IdentityError::Transport(_) => AuthError::Backend(e.to_string()),
            IdentityError::InvalidResponse(_) | IdentityError::Configuration(_) => {
                AuthError::Unexpected
            }
        }
    }
}

/// Result type for lifecycle operations.
pub type AuthResult<T = ()> = Result<T, AuthError>;

/// `{success, error?}` view of an [`AuthResult`] for presentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: &AuthError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

impl<T> From<&AuthResult<T>> for AuthOutcome {
    fn from(result: &AuthResult<T>) -> Self {
        match result {
            Ok(_) => AuthOutcome::ok(),
            Err(e) => AuthOutcome::failed(e),
        }
    }
}

impl<T> From<AuthResult<T>> for AuthOutcome {
    fn from(result: AuthResult<T>) -> Self {
        AuthOutcome::from(&result)
    }
}
