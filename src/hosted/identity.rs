// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`IdentityBackend`] over the hosted auth endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use super::client::{HostedClient, TokenResponse};
use crate::identity::{
    AuthChange, AuthEvent, AuthResponse, BackendSession, DisplayMetadata, IdentityBackend,
    IdentityError, OAuthProvider, Principal,
};

pub struct HostedIdentityBackend {
    client: Arc<HostedClient>,
}

impl HostedIdentityBackend {
    pub fn new(client: Arc<HostedClient>) -> Self {
        Self { client }
    }

    /// Authorize URL for a provider redirect. Built locally, no request.
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, IdentityError> {
        let mut url = Url::parse(&self.client.endpoint("/auth/v1/authorize"))
            .map_err(|e| IdentityError::Configuration(format!("invalid backend URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to.as_str());
        Ok(url)
    }

    async fn post_auth(&self, path: &str, body: Value, label: &str) -> Result<Value, IdentityError> {
        let request = self.client.request(Method::POST, path).json(&body);
        let body = self.client.send(request, label).await?;
        serde_json::from_str(&body)
            .map_err(|e| IdentityError::InvalidResponse(format!("{label} response: {e}")))
    }

    fn start_session(&self, grant: TokenResponse) -> Result<AuthResponse, IdentityError> {
        let session = grant.into_session()?;
        self.client
            .set_session(Some(session.clone()), AuthEvent::SignedIn);
        Ok(AuthResponse {
            principal: Some(session.principal.clone()),
            session: Some(session),
        })
    }
}

#[async_trait]
impl IdentityBackend for HostedIdentityBackend {
    async fn get_session(&self) -> Result<Option<BackendSession>, IdentityError> {
        let Some(session) = self.client.current_session() else {
            return Ok(None);
        };

        if session.expires_within(chrono::Duration::zero(), Utc::now()) {
            debug!(user_id = %session.identity_id(), "Stored session expired; refreshing");
            return match self.client.refresh_session().await {
                Ok(session) => Ok(session),
                Err(e) if e.is_rejected() => Ok(None),
                Err(e) => Err(e),
            };
        }

        Ok(Some(session))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, IdentityError> {
        let body = self
            .post_auth(
                "/auth/v1/token?grant_type=password",
                json!({ "email": email, "password": password }),
                "sign in",
            )
            .await?;

        let grant: TokenResponse = serde_json::from_value(body)
            .map_err(|e| IdentityError::InvalidResponse(format!("sign in response: {e}")))?;
        self.start_session(grant)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: DisplayMetadata,
    ) -> Result<AuthResponse, IdentityError> {
        let body = self
            .post_auth(
                "/auth/v1/signup",
                json!({ "email": email, "password": password, "data": metadata }),
                "sign up",
            )
            .await?;

        parse_sign_up(body).and_then(|parsed| match parsed {
            SignUpResult::Session(grant) => self.start_session(grant),
            SignUpResult::Pending(principal) => {
                info!(user_id = %principal.id, "Sign up pending email confirmation");
                Ok(AuthResponse {
                    principal: Some(principal),
                    session: None,
                })
            }
        })
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, IdentityError> {
        self.authorize_url(provider, redirect_to)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.client.current_session().is_none() {
            return Ok(());
        }

        let request = self.client.request(Method::POST, "/auth/v1/logout");
        let result = self.client.send(request, "sign out").await;

        // The local session ends even when the service could not be told.
        self.client.set_session(None, AuthEvent::SignedOut);

        result.map(|_| ()).map_err(IdentityError::from)
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange> {
        self.client.subscribe()
    }

    async fn complete_oauth_redirect(
        &self,
        callback: &Url,
    ) -> Result<Option<BackendSession>, IdentityError> {
        match parse_callback(callback)? {
            Some(grant) => {
                let response = self.start_session(grant)?;
                Ok(response.session)
            }
            None => {
                warn!("OAuth callback carried no tokens; using current session");
                self.get_session().await
            }
        }
    }
}

enum SignUpResult {
    Session(TokenResponse),
    /// Account created, session withheld until the email is confirmed.
    Pending(Principal),
}

fn parse_sign_up(body: Value) -> Result<SignUpResult, IdentityError> {
    let invalid = |e: serde_json::Error| IdentityError::InvalidResponse(format!("sign up response: {e}"));

    if body.get("access_token").is_some() {
        return serde_json::from_value(body).map(SignUpResult::Session).map_err(invalid);
    }
    match body.get("user") {
        Some(user) => serde_json::from_value(user.clone()).map(SignUpResult::Pending).map_err(invalid),
        None => serde_json::from_value(body).map(SignUpResult::Pending).map_err(invalid),
    }
}

/// Tokens handed over in the callback fragment (or query, for some
/// providers). A provider error becomes a rejection.
fn parse_callback(callback: &Url) -> Result<Option<TokenResponse>, IdentityError> {
    let fragment_pairs: Vec<(String, String)> = callback
        .fragment()
        .map(|fragment| url::form_urlencoded::parse(fragment.as_bytes()).into_owned().collect())
        .unwrap_or_else(Vec::new);
    let pairs: Vec<(String, String)> = fragment_pairs
        .into_iter()
        .chain(callback.query_pairs().into_owned())
        .collect();
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    if let Some(message) = get("error_description").or_else(|| get("error")) {
        return Err(IdentityError::rejected(message));
    }

    let (Some(access_token), Some(refresh_token)) = (get("access_token"), get("refresh_token"))
    else {
        return Ok(None);
    };

    Ok(Some(TokenResponse {
        access_token,
        refresh_token,
        expires_in: get("expires_in").and_then(|v| v.parse().ok()),
        expires_at: get("expires_at").and_then(|v| v.parse().ok()),
        user: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::tests::token_with;
    use crate::hosted::client::tests::test_config;

    fn backend() -> HostedIdentityBackend {
        let client = HostedClient::new(&test_config("https://db.example.com"), None).unwrap();
        HostedIdentityBackend::new(Arc::new(client))
    }

    #[tokio::test]
    async fn oauth_url_is_built_locally() {
        let backend = backend();
        let redirect = Url::parse("https://U-fresher.vercel.app/auth/callback").unwrap();

        let url = backend
            .sign_in_with_oauth(OAuthProvider::Google, &redirect)
            .await
            .unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("provider".to_string(), "google".to_string()),
                (
                    "redirect_to".to_string(),
                    "https://u-fresher.vercel.app/auth/callback".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn callback_fragment_starts_session() {
        let backend = backend();
        let mut events = backend.on_auth_state_change();
        let token = token_with(json!({
            "sub": "google-user",
            "email": "g@b.com",
            "user_metadata": { "full_name": "Gita" }
        }));
        let callback = Url::parse(&format!(
            "https://app.example.com/auth/callback#access_token={token}&refresh_token=r1&expires_in=3600&token_type=bearer"
        ))
        .unwrap();

        let session = backend
            .complete_oauth_redirect(&callback)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.identity_id().as_str(), "google-user");
        assert_eq!(session.refresh_token, "r1");
        assert!(session.expires_at.is_some());
        assert_eq!(session.principal.metadata.full_name.as_deref(), Some("Gita"));
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedIn);
        assert_eq!(backend.get_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn callback_error_is_rejected() {
        let backend = backend();
        let callback = Url::parse(
            "https://app.example.com/auth/callback#error=access_denied&error_description=User+denied+access",
        )
        .unwrap();

        let err = backend.complete_oauth_redirect(&callback).await.unwrap_err();
        assert_eq!(err, IdentityError::rejected("User denied access"));
    }

    #[tokio::test]
    async fn callback_without_tokens_falls_back_to_current_session() {
        let backend = backend();
        let callback = Url::parse("https://app.example.com/auth/callback").unwrap();

        assert_eq!(backend.complete_oauth_redirect(&callback).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_session_survives_unreachable_refresh() {
        let client = Arc::new(HostedClient::new(&test_config("http://127.0.0.1:9"), None).unwrap());
        let stored = BackendSession {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
            principal: Principal {
                id: "user-1".into(),
                email: None,
                metadata: Default::default(),
            },
        };
        client.set_session(Some(stored.clone()), AuthEvent::SignedIn);
        let backend = HostedIdentityBackend::new(client.clone());

        let err = backend.get_session().await.unwrap_err();
        assert!(matches!(err, IdentityError::Transport(_)));
        assert_eq!(client.current_session(), Some(stored));
    }

    #[tokio::test]
    async fn sign_out_without_session_sends_nothing() {
        let backend = backend();
        backend.sign_out().await.unwrap();
        assert!(backend.get_session().await.unwrap().is_none());
    }

    #[test]
    fn sign_up_with_session_or_pending_confirmation() {
        let session = parse_sign_up(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "user-1", "email": "a@b.com" }
        }))
        .unwrap();
        assert!(matches!(session, SignUpResult::Session(_)));

        let pending = parse_sign_up(json!({
            "id": "user-2",
            "email": "b@b.com",
            "user_metadata": { "full_name": "B" }
        }))
        .unwrap();
        match pending {
            SignUpResult::Pending(principal) => {
                assert_eq!(principal.id.as_str(), "user-2");
                assert_eq!(principal.metadata.full_name.as_deref(), Some("B"));
            }
            SignUpResult::Session(_) => panic!("expected pending sign up"),
        }
    }

    #[test]
    fn sign_up_garbage_is_invalid() {
        let err = parse_sign_up(json!({ "unexpected": true })).err().unwrap();
        assert!(matches!(err, IdentityError::InvalidResponse(_)));
    }
}
