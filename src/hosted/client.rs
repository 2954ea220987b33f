// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared HTTP client for the hosted service.
//!
//! Owns the current session: both the identity adapter and the profile
//! repository authenticate with it, and every change to it is mirrored to
//! the optional [`SessionFile`] and broadcast as an [`AuthChange`].

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::persistence::SessionFile;
use crate::auth::claims::AccessTokenClaims;
use crate::config::BackendConfig;
use crate::identity::{
    AuthChange, AuthEvent, BackendSession, IdentityError, Principal, AUTH_EVENT_CHANNEL_CAPACITY,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Failure of one HTTP exchange, before it is mapped onto a domain error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// No response (connect, timeout, TLS, body read)
    Transport(String),
    /// Non-success status with the message extracted from the body
    Status { status: StatusCode, message: String },
}

impl From<HttpFailure> for IdentityError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Transport(message) => IdentityError::Transport(message),
            HttpFailure::Status { status, message } if status.is_client_error() => {
                IdentityError::Rejected { message }
            }
            HttpFailure::Status { status, message } => {
                IdentityError::Transport(format!("{status}: {message}"))
            }
        }
    }
}

/// Token grant as returned by the auth endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<Principal>,
}

impl TokenResponse {
    /// Convert into a session. The principal comes from the response body
    /// when present, otherwise from the access token's claims.
    pub fn into_session(self) -> Result<BackendSession, IdentityError> {
        let claims = match self.user {
            Some(_) => None,
            None => Some(AccessTokenClaims::decode_unverified(&self.access_token)?),
        };

        let expires_at = self
            .expires_at
            .and_then(|at| chrono::DateTime::from_timestamp(at, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            })
            .or_else(|| claims.as_ref().and_then(AccessTokenClaims::expires_at));

        let principal = match (self.user, claims) {
            (Some(user), _) => user,
            (None, Some(claims)) => claims.principal(),
            (None, None) => {
                return Err(IdentityError::InvalidResponse(
                    "token response without user".to_string(),
                ))
            }
        };

        Ok(BackendSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            principal,
        })
    }
}

/// HTTP client bound to one hosted project.
pub struct HostedClient {
    http: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<BackendSession>>,
    events: broadcast::Sender<AuthChange>,
    session_file: Option<SessionFile>,
}

impl HostedClient {
    /// Build the client. A session mirrored in `session_file` is picked up
    /// so the next restore finds it.
    pub fn new(
        config: &BackendConfig,
        session_file: Option<SessionFile>,
    ) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let stored = match &session_file {
            Some(file) => match file.load() {
                Ok(session) => session,
                Err(e) => {
                    warn!(path = %file.path().display(), error = %e, "Ignoring unreadable session file");
                    None
                }
            },
            None => None,
        };
        if let Some(session) = &stored {
            info!(user_id = %session.identity_id(), "Loaded stored session");
        }

        let (events, _) = broadcast::channel(AUTH_EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            http,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(stored),
            events,
            session_file,
        })
    }

    /// Absolute URL for `path` (which starts with `/`).
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn current_session(&self) -> Option<BackendSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    /// Replace the current session, mirror it to disk and broadcast `event`.
    pub fn set_session(&self, session: Option<BackendSession>, event: AuthEvent) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session.clone();

        if let Some(file) = &self.session_file {
            let persisted = match &session {
                Some(session) => file.save(session),
                None => file.delete(),
            };
            if let Err(e) = persisted {
                warn!(path = %file.path().display(), error = %e, "Failed to mirror session");
            }
        }

        debug!(?event, "Session changed");
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthChange::new(event, session));
    }

    /// Request carrying the API key and, when signed in, the access token.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .current_session()
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone());

        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    /// Send `request` and return the response body of a successful exchange.
    pub async fn send(&self, request: RequestBuilder, label: &str) -> Result<String, HttpFailure> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpFailure::Transport(format!("{label} failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(HttpFailure::Status {
                status,
                message: error_message(status, &body),
            });
        }

        Ok(body)
    }

    /// Exchange the refresh token for a new session.
    ///
    /// A rejected refresh token ends the session and broadcasts `SIGNED_OUT`.
    /// Transport failures leave the session in place for a later retry.
    pub async fn refresh_session(&self) -> Result<Option<BackendSession>, IdentityError> {
        let Some(current) = self.current_session() else {
            return Ok(None);
        };

        let request = self
            .request(Method::POST, "/auth/v1/token?grant_type=refresh_token")
            .json(&json!({ "refresh_token": current.refresh_token }));

        let body = match self.send(request, "refresh session").await {
            Ok(body) => body,
            Err(failure) => {
                let error = IdentityError::from(failure);
                if error.is_rejected() {
                    warn!(user_id = %current.identity_id(), error = %error, "Refresh token rejected; signing out");
                    self.set_session(None, AuthEvent::SignedOut);
                }
                return Err(error);
            }
        };

        let grant: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| IdentityError::InvalidResponse(format!("refresh response: {e}")))?;
        let session = grant.into_session()?;

        info!(user_id = %session.identity_id(), "Access token refreshed");
        self.set_session(Some(session.clone()), AuthEvent::TokenRefreshed);
        Ok(Some(session))
    }
}

/// Extract a human-readable message from an error body.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(message) = fields.get(key).and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.to_string();
                }
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
