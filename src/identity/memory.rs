// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory identity backend.
//!
//! Keeps accounts and the current session in process memory. Used for local
//! development and as the backend stub in tests: every call is counted and
//! the next call can be made to fail.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{
    AuthChange, AuthResponse, BackendSession, DisplayMetadata, IdentityBackend, IdentityError,
    OAuthProvider, Principal, AUTH_EVENT_CHANNEL_CAPACITY,
};
use crate::models::IdentityId;

/// Message returned for unknown email / wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid login credentials";
/// Message returned when signing up with a registered email.
pub const ALREADY_REGISTERED: &str = "User already registered";

const SESSION_LIFETIME_SECS: i64 = 3600;
const AUTHORIZE_BASE_URL: &str = "https://identity.invalid/auth/v1/authorize";

/// Backend operations, for call-count assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCall {
    GetSession,
    SignInWithPassword,
    SignUp,
    SignInWithOAuth,
    SignOut,
    CompleteOAuthRedirect,
}

struct Account {
    password: String,
    principal: Principal,
}

#[derive(Default)]
struct BackendState {
    accounts: HashMap<String, Account>,
    session: Option<BackendSession>,
    calls: HashMap<BackendCall, usize>,
    fail_next: Option<IdentityError>,
    omit_principal: bool,
    oauth_principal: Option<Principal>,
}

/// Identity backend that lives entirely in process memory.
pub struct InMemoryIdentityBackend {
    state: Mutex<BackendState>,
    events: broadcast::Sender<AuthChange>,
}

impl Default for InMemoryIdentityBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(BackendState::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an account without signing it in.
    pub fn register(&self, email: &str, password: &str) -> Principal {
        let principal = new_principal(email, DisplayMetadata::default());
        self.lock().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                principal: principal.clone(),
            },
        );
        principal
    }

    /// Install a session as if it had been restored from storage.
    pub fn install_session(&self, principal: Principal) -> BackendSession {
        let session = new_session(principal);
        self.lock().session = Some(session.clone());
        session
    }

    /// Make the next backend call fail with `error`.
    pub fn fail_next(&self, error: IdentityError) {
        self.lock().fail_next = Some(error);
    }

    /// Make successful sign-ins and sign-ups report no principal.
    pub fn omit_principal(&self, omit: bool) {
        self.lock().omit_principal = omit;
    }

    /// Principal that the next OAuth redirect completion signs in.
    pub fn set_oauth_principal(&self, principal: Principal) {
        self.lock().oauth_principal = Some(principal);
    }

    /// Broadcast a notification as if it came from elsewhere (another tab,
    /// a refresh timer, ...). The current session follows the event.
    pub fn emit(&self, change: AuthChange) {
        {
            let mut state = self.lock();
            match change.event {
                super::AuthEvent::SignedOut => state.session = None,
                _ => {
                    if let Some(session) = &change.session {
                        state.session = Some(session.clone());
                    }
                }
            }
        }
        debug!(event = ?change.event, "In-memory identity backend emitting change");
        let _ = self.events.send(change);
    }

    pub fn call_count(&self, call: BackendCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn current_session(&self) -> Option<BackendSession> {
        self.lock().session.clone()
    }

    /// Count the call and surface an injected failure, if any.
    fn enter(&self, call: BackendCall) -> Result<(), IdentityError> {
        let mut state = self.lock();
        *state.calls.entry(call).or_insert(0) += 1;
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn start_session(&self, principal: Principal) -> BackendSession {
        let session = new_session(principal);
        self.lock().session = Some(session.clone());
        let _ = self.events.send(AuthChange::signed_in(session.clone()));
        session
    }

    fn response_for(&self, session: BackendSession) -> AuthResponse {
        if self.lock().omit_principal {
            return AuthResponse::default();
        }
        AuthResponse {
            principal: Some(session.principal.clone()),
            session: Some(session),
        }
    }
}

#[async_trait]
impl IdentityBackend for InMemoryIdentityBackend {
    async fn get_session(&self) -> Result<Option<BackendSession>, IdentityError> {
        self.enter(BackendCall::GetSession)?;
        Ok(self.lock().session.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, IdentityError> {
        self.enter(BackendCall::SignInWithPassword)?;

        let principal = {
            let state = self.lock();
            match state.accounts.get(email) {
                Some(account) if account.password == password => account.principal.clone(),
                _ => return Err(IdentityError::rejected(INVALID_CREDENTIALS)),
            }
        };

        let session = self.start_session(principal);
        Ok(self.response_for(session))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: DisplayMetadata,
    ) -> Result<AuthResponse, IdentityError> {
        self.enter(BackendCall::SignUp)?;

        let principal = {
            let mut state = self.lock();
            if state.accounts.contains_key(email) {
                return Err(IdentityError::rejected(ALREADY_REGISTERED));
            }
            let principal = new_principal(email, metadata);
            state.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    principal: principal.clone(),
                },
            );
            principal
        };

        let session = self.start_session(principal);
        Ok(self.response_for(session))
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, IdentityError> {
        self.enter(BackendCall::SignInWithOAuth)?;

        let mut url = Url::parse(AUTHORIZE_BASE_URL)
            .map_err(|e| IdentityError::Configuration(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to.as_str());
        Ok(url)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.enter(BackendCall::SignOut)?;
        self.lock().session = None;
        let _ = self.events.send(AuthChange::signed_out());
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn complete_oauth_redirect(
        &self,
        callback: &Url,
    ) -> Result<Option<BackendSession>, IdentityError> {
        self.enter(BackendCall::CompleteOAuthRedirect)?;

        if let Some((_, description)) = callback
            .query_pairs()
            .find(|(key, _)| key == "error_description")
        {
            return Err(IdentityError::rejected(description.into_owned()));
        }

        let pending = self.lock().oauth_principal.take();
        match pending {
            Some(principal) => Ok(Some(self.start_session(principal))),
            None => Ok(self.lock().session.clone()),
        }
    }
}

fn new_principal(email: &str, metadata: DisplayMetadata) -> Principal {
    Principal {
        id: IdentityId::from(Uuid::new_v4().to_string()),
        email: Some(email.to_string()),
        metadata,
    }
}

fn new_session(principal: Principal) -> BackendSession {
    BackendSession {
        access_token: Uuid::new_v4().to_string(),
        refresh_token: Uuid::new_v4().to_string(),
        expires_at: Some(Utc::now() + Duration::seconds(SESSION_LIFETIME_SECS)),
        principal,
    }
}
