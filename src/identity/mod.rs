// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Backend
//!
//! Contract consumed from the hosted identity service: credential checks,
//! session issuance and refresh, OAuth redirects, and out-of-band
//! notifications about session changes.
//!
//! ## Notifications
//!
//! The backend publishes an [`AuthChange`] on a `tokio::sync::broadcast`
//! channel whenever its session changes, whether the change came from this
//! client, another tab, a redirect completion or a token refresh.
//! [`IdentityBackend::on_auth_state_change`] hands out a fresh receiver.
//!
//! ## Implementations
//!
//! - [`InMemoryIdentityBackend`] - local accounts, call counting, fault injection
//! - [`crate::hosted::HostedIdentityBackend`] - the hosted REST service

pub mod error;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use url::Url;

use crate::models::IdentityId;

pub use error::IdentityError;
pub use memory::{BackendCall, InMemoryIdentityBackend};

/// Capacity of the notification channel. Slow listeners that fall further
/// behind observe `RecvError::Lagged` and resynchronise.
pub const AUTH_EVENT_CHANNEL_CAPACITY: usize = 32;

/// Display metadata stored by the identity backend next to the principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Principal record owned by the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: IdentityId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "user_metadata")]
    pub metadata: DisplayMetadata,
}

/// Session issued by the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "user")]
    pub principal: Principal,
}

impl BackendSession {
    pub fn identity_id(&self) -> &IdentityId {
        &self.principal.id
    }

    /// True when the access token expires within `margin` of `now`.
    /// Sessions without an expiry never need a refresh.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires_at| {
                expires_at
                    .checked_sub_signed(margin)
                    .is_none_or(|refresh_at| refresh_at <= now)
            })
            .unwrap_or(false)
    }
}

/// Result of a password sign-in or sign-up.
///
/// Either part may be absent: sign-up with email confirmation yields a
/// principal without a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResponse {
    pub principal: Option<Principal>,
    pub session: Option<BackendSession>,
}

/// OAuth providers supported by the redirect flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of session change reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One out-of-band notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<BackendSession>,
}

impl AuthChange {
    pub fn new(event: AuthEvent, session: Option<BackendSession>) -> Self {
        Self { event, session }
    }

    pub fn signed_in(session: BackendSession) -> Self {
        Self::new(AuthEvent::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }
}

/// Identity backend consumed by the auth lifecycle controller.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Current session, if one exists.
    async fn get_session(&self) -> Result<Option<BackendSession>, IdentityError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, IdentityError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: DisplayMetadata,
    ) -> Result<AuthResponse, IdentityError>;

    /// Start a redirect-based OAuth sign-in. Returns the provider URL the
    /// client must navigate to; completion arrives later via
    /// [`complete_oauth_redirect`](Self::complete_oauth_redirect).
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Subscribe to session changes. Dropping the receiver unsubscribes.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange>;

    /// Finish an OAuth redirect that landed on `callback`.
    ///
    /// Backends that pick the session up on their own only need to report
    /// the current session.
    async fn complete_oauth_redirect(
        &self,
        callback: &Url,
    ) -> Result<Option<BackendSession>, IdentityError> {
        let _ = callback;
        self.get_session().await
    }
}
