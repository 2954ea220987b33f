// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth callback completion.
//!
//! The provider sends the browser back to `/auth/callback`. Completing the
//! redirect yields a backend session; the matching profile is then loaded
//! and the caller is told where to go next.

use serde::Serialize;
use tracing::{error, info, warn};

use super::controller::AuthController;
use crate::identity::Principal;
use crate::models::{Profile, ProfileDraft};
use crate::profiles::RepositoryError;

/// Where to navigate once the callback was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum CallbackRoute {
    Dashboard,
    SignIn { error: Option<String> },
}

impl CallbackRoute {
    pub fn path(&self) -> &'static str {
        match self {
            CallbackRoute::Dashboard => "/dashboard",
            CallbackRoute::SignIn { .. } => "/auth",
        }
    }
}

impl AuthController {
    /// Complete an OAuth redirect landing on `callback_url`.
    ///
    /// First-time OAuth principals have no profile yet; one is created from
    /// the provider's display metadata with default role and age.
    pub async fn handle_oauth_callback(&self, callback_url: &url::Url) -> CallbackRoute {
        let _loading = self.store.begin_operation();

        let session = match self.backend.complete_oauth_redirect(callback_url).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!("OAuth callback completed without a session");
                return CallbackRoute::SignIn { error: None };
            }
            Err(e) => {
                error!(error = %e, "OAuth callback failed");
                return CallbackRoute::SignIn {
                    error: Some(e.to_string()),
                };
            }
        };

        let id = session.identity_id().clone();
        match self.fetch_and_publish(&id).await {
            Ok(_) => {}
            Err(RepositoryError::NotFound(_)) => self.create_oauth_profile(&session.principal).await,
            Err(e) => error!(user_id = %id, error = %e, "Error loading profile"),
        }

        info!(user_id = %id, "OAuth sign in completed");
        CallbackRoute::Dashboard
    }

    async fn create_oauth_profile(&self, principal: &Principal) {
        let mut draft = ProfileDraft::new();
        draft.email = principal.email.clone();
        draft.name = principal.metadata.full_name.clone();
        draft.profile_pic = principal.metadata.avatar_url.clone();

        let profile = Profile::from_draft(principal.id.clone(), &draft);
        match self.profiles.insert(&profile).await {
            Ok(()) => {
                info!(user_id = %principal.id, "Created profile for OAuth principal");
                self.store.set_identity(Some(profile));
            }
            Err(e) => error!(user_id = %principal.id, error = %e, "Error creating profile"),
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::auth::controller::tests::Harness;
    use crate::auth::Role;
    use crate::identity::{BackendCall, DisplayMetadata, IdentityError};
    use crate::models::{IdentityId, DEFAULT_AGE};
    use crate::profiles::RepositoryCall;

    fn callback() -> Url {
        Url::parse("https://app.example.com/auth/callback").unwrap()
    }

    fn oauth_principal(id: &str) -> Principal {
        Principal {
            id: IdentityId::from(id),
            email: Some("g@b.com".into()),
            metadata: DisplayMetadata {
                full_name: Some("Gita".into()),
                avatar_url: Some("https://img.example.com/g.png".into()),
            },
        }
    }

    #[test]
    fn routes_map_to_paths() {
        assert_eq!(CallbackRoute::Dashboard.path(), "/dashboard");
        assert_eq!(CallbackRoute::SignIn { error: None }.path(), "/auth");
    }

    #[tokio::test]
    async fn existing_profile_goes_to_dashboard() {
        let harness = Harness::restored().await;
        let principal = oauth_principal("google-1");
        let profile = Profile::from_draft(
            principal.id.clone(),
            &ProfileDraft::new().name("Gita").role(Role::Mentor),
        );
        harness.profiles.seed(profile.clone());
        harness.backend.set_oauth_principal(principal);

        let route = harness.controller.handle_oauth_callback(&callback()).await;

        assert_eq!(route, CallbackRoute::Dashboard);
        assert_eq!(harness.session().identity(), Some(profile));
        assert_eq!(harness.profiles.call_count(RepositoryCall::Insert), 0);
        assert!(!harness.session().is_loading());
    }

    #[tokio::test]
    async fn first_oauth_sign_in_creates_profile() {
        let harness = Harness::restored().await;
        harness.backend.set_oauth_principal(oauth_principal("google-2"));

        let route = harness.controller.handle_oauth_callback(&callback()).await;

        assert_eq!(route, CallbackRoute::Dashboard);
        let identity = harness.session().identity().unwrap();
        assert_eq!(identity.name, "Gita");
        assert_eq!(identity.email, "g@b.com");
        assert_eq!(identity.profile_pic, "https://img.example.com/g.png");
        assert_eq!(identity.role, Role::Junior);
        assert_eq!(identity.age, DEFAULT_AGE);
        assert_eq!(harness.profiles.inserts().len(), 1);
    }

    #[tokio::test]
    async fn no_session_goes_back_to_sign_in() {
        let harness = Harness::restored().await;

        let route = harness.controller.handle_oauth_callback(&callback()).await;

        assert_eq!(route, CallbackRoute::SignIn { error: None });
        assert!(harness.session().identity().is_none());
        assert_eq!(harness.backend.call_count(BackendCall::CompleteOAuthRedirect), 1);
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let harness = Harness::restored().await;
        let url = Url::parse(
            "https://app.example.com/auth/callback?error=access_denied&error_description=User+cancelled",
        )
        .unwrap();

        let route = harness.controller.handle_oauth_callback(&url).await;

        assert_eq!(
            route,
            CallbackRoute::SignIn {
                error: Some("User cancelled".into())
            }
        );
        assert!(!harness.session().is_loading());
    }

    #[tokio::test]
    async fn transport_failure_is_reported() {
        let harness = Harness::restored().await;
        harness
            .backend
            .fail_next(IdentityError::Transport("timed out".into()));

        let route = harness.controller.handle_oauth_callback(&callback()).await;

        assert!(matches!(route, CallbackRoute::SignIn { error: Some(_) }));
    }
}
