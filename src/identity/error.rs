// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity backend errors.

/// Error returned by an [`IdentityBackend`](super::IdentityBackend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The backend understood the request and refused it (bad credentials,
    /// duplicate account, expired refresh token, ...).
    #[error("{message}")]
    Rejected { message: String },

    /// The backend could not be reached or answered with a server error.
    #[error("Identity backend request failed: {0}")]
    Transport(String),

    /// The backend answered with something that could not be interpreted.
    #[error("Identity backend returned an invalid response: {0}")]
    InvalidResponse(String),

    /// Local configuration prevents talking to the backend.
    #[error("Identity backend is misconfigured: {0}")]
    Configuration(String),
}

impl IdentityError {
    pub fn rejected(message: impl Into<String>) -> Self {
        IdentityError::Rejected {
            message: message.into(),
        }
    }

    /// Whether the backend understood the request and refused it. Transport
    /// and protocol failures are not rejections.
    pub fn is_rejected(&self) -> bool {
        matches!(self, IdentityError::Rejected { .. })
    }
}
