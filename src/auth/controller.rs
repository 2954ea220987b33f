// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth Lifecycle Controller
//!
//! Orchestrates sign-in, sign-up, OAuth sign-in, sign-out, session restore
//! and reactions to out-of-band backend notifications, publishing the result
//! to a [`SessionStore`].
//!
//! ## States
//!
//! ```text
//! Unauthenticated ──restore finds session / sign-in / sign-up──▶ Authenticated
//!        ▲                                                          │
//!        └──────────── sign-out / backend SIGNED_OUT ───────────────┘
//! ```
//!
//! `loading` is orthogonal and raised for the duration of every operation.
//! Failures never move the session; they come back to the caller as an
//! [`AuthError`].
//!
//! ## Concurrency
//!
//! Explicit calls and notification handling may interleave freely. Each
//! profile load takes a generation ticket from the store, so the load that
//! started last wins and a sign-out supersedes every load still in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::elevation::AdminCode;
use super::error::{AuthError, AuthResult};
use crate::config::AppConfig;
use crate::identity::{
    AuthChange, AuthEvent, DisplayMetadata, IdentityBackend, IdentityError, OAuthProvider,
};
use crate::models::{IdentityId, Profile, ProfileDraft, ProfilePatch};
use crate::profiles::{ProfileRepository, RepositoryResult};
use crate::session::SessionStore;

/// Path of the OAuth callback route, relative to the app origin.
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Settings the controller needs from configuration.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub admin_code: AdminCode,
    /// Where the OAuth provider sends the browser back to.
    pub oauth_callback: Url,
}

impl AuthSettings {
    pub fn new(admin_code: AdminCode, app_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            admin_code,
            oauth_callback: app_url.join(OAUTH_CALLBACK_PATH)?,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, url::ParseError> {
        Self::new(AdminCode::new(config.admin_code.clone()), &config.app_url)
    }
}

/// The auth lifecycle controller.
pub struct AuthController {
    pub(super) backend: Arc<dyn IdentityBackend>,
    pub(super) profiles: Arc<dyn ProfileRepository>,
    pub(super) store: SessionStore,
    settings: AuthSettings,
    restored: AtomicBool,
}

impl AuthController {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        profiles: Arc<dyn ProfileRepository>,
        store: SessionStore,
        settings: AuthSettings,
    ) -> Self {
        Self {
            backend,
            profiles,
            store,
            settings,
            restored: AtomicBool::new(false),
        }
    }

    /// The store this controller publishes to.
    pub fn session(&self) -> &SessionStore {
        &self.store
    }

    /// Subscribe to backend notifications, then restore the stored session.
    ///
    /// Subscribing first means no notification fired during the restore is
    /// missed.
    pub async fn start(self: &Arc<Self>) -> AuthSubscription {
        let subscription = self.subscribe_to_backend();
        self.restore_session().await;
        subscription
    }

    /// Look up an existing backend session and publish its profile.
    ///
    /// Runs once per controller; later calls only log.
    pub async fn restore_session(&self) {
        if self.restored.swap(true, Ordering::SeqCst) {
            warn!("Session restore already ran; ignoring repeated call");
            return;
        }

        let _loading = self.store.begin_operation();

        match self.backend.get_session().await {
            Ok(Some(session)) => {
                debug!(user_id = %session.identity_id(), "Found existing session");
                self.load_profile(session.identity_id()).await;
            }
            Ok(None) => debug!("No existing session"),
            Err(e) => error!(error = %e, "Error getting session"),
        }
    }

    /// Password sign-in with optional admin-code elevation.
    ///
    /// A matching `admin_code` elevates the stored role to admin before the
    /// profile is loaded. A failed elevation is logged and sign-in proceeds.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        admin_code: Option<&str>,
    ) -> AuthResult {
        let _loading = self.store.begin_operation();

        let response = self
            .backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| backend_failure("sign in", e))?;

        let Some(principal) = response.principal else {
            warn!("Sign in accepted but no user data returned");
            return Err(AuthError::NoUserData);
        };

        if self.settings.admin_code.matches(admin_code) {
            match self
                .profiles
                .update(&principal.id, &ProfilePatch::elevate_to_admin())
                .await
            {
                Ok(()) => info!(user_id = %principal.id, "Elevated profile role to admin"),
                Err(e) => error!(
                    user_id = %principal.id,
                    error = %e,
                    "Error updating user role"
                ),
            }
        } else if admin_code.is_some_and(|code| !code.is_empty()) {
            warn!(user_id = %principal.id, "Admin code did not match; no elevation");
        }

        self.load_profile(&principal.id).await;
        info!(user_id = %principal.id, "Signed in");
        Ok(())
    }

    /// Create a principal and its profile, then publish the profile.
    pub async fn sign_up(&self, draft: ProfileDraft) -> AuthResult {
        let _loading = self.store.begin_operation();

        let Some((email, password)) = draft.credentials() else {
            return Err(AuthError::MissingCredentials);
        };

        let metadata = DisplayMetadata {
            full_name: draft.name.clone(),
            avatar_url: draft.profile_pic.clone(),
        };

        let response = self
            .backend
            .sign_up(email, password, metadata)
            .await
            .map_err(|e| backend_failure("sign up", e))?;

        let Some(principal) = response.principal else {
            warn!("Sign up accepted but no user data returned");
            return Err(AuthError::NoUserData);
        };

        let profile = Profile::from_draft(principal.id.clone(), &draft);

        // No rollback: the principal stays without a profile.
        if let Err(e) = self.profiles.insert(&profile).await {
            error!(user_id = %principal.id, error = %e, "Error creating profile");
            return Err(AuthError::ProfileSetupFailed);
        }

        info!(user_id = %principal.id, role = %profile.role, "Signed up");
        self.store.set_identity(Some(profile));
        Ok(())
    }

    /// Start the Google OAuth redirect. Returns the provider URL to navigate
    /// to; completion is handled by
    /// [`handle_oauth_callback`](Self::handle_oauth_callback).
    pub async fn sign_in_with_google(&self) -> AuthResult<Url> {
        let _loading = self.store.begin_operation();

        let url = self
            .backend
            .sign_in_with_oauth(OAuthProvider::Google, &self.settings.oauth_callback)
            .await
            .map_err(|e| backend_failure("Google sign in", e))?;

        info!(
            provider = %OAuthProvider::Google,
            redirect_to = %self.settings.oauth_callback,
            "OAuth redirect initiated"
        );
        Ok(url)
    }

    /// Sign out. Backend errors are logged; the identity is always cleared.
    pub async fn sign_out(&self) {
        let _loading = self.store.begin_operation();

        if let Err(e) = self.backend.sign_out().await {
            error!(error = %e, "Sign out error");
        }

        self.store.clear();
        info!("Signed out");
    }

    /// Raw identity setter, forwarded to the store.
    pub fn set_identity(&self, identity: Option<Profile>) {
        self.store.set_identity(identity);
    }

    /// Fetch the profile for `id` and publish it unless a newer load or a
    /// sign-out superseded this one. Errors are logged and leave the session
    /// unchanged.
    ///
    /// Returns the fetched record, whether or not it was published.
    pub async fn load_profile(&self, id: &IdentityId) -> Option<Profile> {
        match self.fetch_and_publish(id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                error!(user_id = %id, error = %e, "Error loading profile");
                None
            }
        }
    }

    pub(super) async fn fetch_and_publish(&self, id: &IdentityId) -> RepositoryResult<Profile> {
        let generation = self.store.next_generation();
        let profile = self.profiles.get(id).await?;

        if self.store.publish_if_current(generation, profile.clone()) {
            debug!(user_id = %id, role = %profile.role, "Published profile");
        }
        Ok(profile)
    }

    /// Spawn a task that applies backend notifications to the session.
    pub fn subscribe_to_backend(self: &Arc<Self>) -> AuthSubscription {
        let events = self.backend.on_auth_state_change();
        let shutdown = CancellationToken::new();

        let controller = Arc::clone(self);
        let token = shutdown.clone();
        let handle = tokio::spawn(async move { controller.listen(events, token).await });

        AuthSubscription {
            shutdown,
            handle: Some(handle),
        }
    }

    async fn listen(&self, mut events: broadcast::Receiver<AuthChange>, shutdown: CancellationToken) {
        debug!("Auth state listener starting");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Auth state listener shutting down");
                    return;
                }
                received = events.recv() => match received {
                    Ok(change) => self.handle_auth_change(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth state listener lagged; resynchronising");
                        self.resynchronise().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Identity backend closed its notification channel");
                        return;
                    }
                },
            }
        }
    }

    /// Apply one backend notification.
    pub async fn handle_auth_change(&self, change: AuthChange) {
        let _loading = self.store.begin_operation();

        match (change.event, change.session) {
            (AuthEvent::SignedIn, Some(session)) => {
                debug!(user_id = %session.identity_id(), "Backend reported sign in");
                self.load_profile(session.identity_id()).await;
            }
            (AuthEvent::SignedOut, _) => {
                debug!("Backend reported sign out");
                self.store.clear();
            }
            (event, _) => debug!(?event, "Ignoring auth state change"),
        }
    }

    async fn resynchronise(&self) {
        let _loading = self.store.begin_operation();

        match self.backend.get_session().await {
            Ok(Some(session)) => {
                self.load_profile(session.identity_id()).await;
            }
            Ok(None) => self.store.clear(),
            Err(e) => warn!(error = %e, "Could not resynchronise session"),
        }
    }
}

/// Log a backend failure and map it onto the caller-facing error.
fn backend_failure(operation: &'static str, e: IdentityError) -> AuthError {
    if e.is_rejected() {
        warn!(operation, error = %e, "Identity backend refused request");
    } else {
        error!(operation, error = %e, "Unexpected identity backend failure");
    }
    AuthError::from(e)
}

/// Handle for the notification listener task. Dropping it unsubscribes.
pub struct AuthSubscription {
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {
        self.shutdown.cancel();
    }

    /// Unsubscribe and wait for the listener task to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Auth state listener ended abnormally");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !self.shutdown.is_cancelled()
            && self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
