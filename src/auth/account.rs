// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edits to the signed-in profile.
//!
//! Every edit writes a [`ProfilePatch`] for the published identity, then
//! reloads the record so the session reflects what the store accepted.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use super::controller::AuthController;
use super::error::{AuthError, AuthResult};
use super::roles::Role;
use crate::models::{Membership, Profile, ProfileEdit, ProfilePatch};

impl AuthController {
    /// The published profile, if its role has `required`'s privilege.
    pub fn require_role(&self, required: Role) -> AuthResult<Profile> {
        let profile = self.store.identity().ok_or(AuthError::NotAuthenticated)?;

        if !profile.has_role(required) {
            warn!(
                user_id = %profile.id,
                role = %profile.role,
                required = %required,
                "Role check failed"
            );
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(profile)
    }

    /// Apply user-editable fields. The role never changes here, and the
    /// mentorship flag is honoured for mentors only.
    pub async fn update_profile(&self, edit: ProfileEdit) -> AuthResult<Profile> {
        let _loading = self.store.begin_operation();

        let profile = self.store.identity().ok_or(AuthError::NotAuthenticated)?;
        let patch = edit.into_patch(profile.role);
        if patch.is_empty() {
            debug!(user_id = %profile.id, "Empty profile edit; nothing to write");
            return Ok(profile);
        }

        self.write_patch(&profile, &patch).await
    }

    /// Add `key` to one of the membership sets. Joining twice writes nothing.
    pub async fn join(&self, kind: Membership, key: &str) -> AuthResult<Profile> {
        let _loading = self.store.begin_operation();

        let profile = self.store.identity().ok_or(AuthError::NotAuthenticated)?;
        if kind == Membership::Mentor && profile.role != Role::Junior {
            warn!(user_id = %profile.id, role = %profile.role, "Only juniors connect with mentors");
            return Err(AuthError::InsufficientPermissions);
        }

        let mut keys = profile.memberships(kind).clone();
        if !keys.insert(key.to_string()) {
            debug!(user_id = %profile.id, %kind, key, "Already a member");
            return Ok(profile);
        }

        let updated = self
            .write_patch(&profile, &ProfilePatch::memberships(kind, keys))
            .await?;
        info!(user_id = %profile.id, %kind, key, "Joined");
        Ok(updated)
    }

    /// Remove `key` from one of the membership sets. Absent keys are a no-op.
    pub async fn leave(&self, kind: Membership, key: &str) -> AuthResult<Profile> {
        let _loading = self.store.begin_operation();

        let profile = self.store.identity().ok_or(AuthError::NotAuthenticated)?;
        let mut keys: BTreeSet<String> = profile.memberships(kind).clone();
        if !keys.remove(key) {
            debug!(user_id = %profile.id, %kind, key, "Not a member");
            return Ok(profile);
        }

        let updated = self
            .write_patch(&profile, &ProfilePatch::memberships(kind, keys))
            .await?;
        info!(user_id = %profile.id, %kind, key, "Left");
        Ok(updated)
    }

    async fn write_patch(&self, profile: &Profile, patch: &ProfilePatch) -> AuthResult<Profile> {
        if let Err(e) = self.profiles.update(&profile.id, patch).await {
            error!(user_id = %profile.id, error = %e, "Error updating profile");
            return Err(AuthError::ProfileUpdateFailed);
        }

        self.fetch_and_publish(&profile.id).await.map_err(|e| {
            error!(user_id = %profile.id, error = %e, "Error reloading profile");
            AuthError::ProfileUpdateFailed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::controller::tests::Harness;
    use crate::profiles::{RepositoryCall, RepositoryError};

    async fn signed_in(role: Role) -> Harness {
        let harness = Harness::restored().await;
        harness.member("a@b.com", "pw", role);
        harness.controller.sign_in("a@b.com", "pw", None).await.unwrap();
        harness
    }

    #[tokio::test]
    async fn edits_require_identity() {
        let harness = Harness::restored().await;

        let err = harness
            .controller
            .update_profile(ProfileEdit::default())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthenticated);
        assert_eq!(
            harness.controller.require_role(Role::Junior).unwrap_err(),
            AuthError::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn update_profile_writes_and_republishes() {
        let harness = signed_in(Role::Junior).await;

        let updated = harness
            .controller
            .update_profile(ProfileEdit {
                name: Some("Asha".into()),
                age: Some(21),
                college: Some("IIT Delhi".into()),
                ..ProfileEdit::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.name, "Asha");
        assert_eq!(updated.age, 21);
        assert_eq!(updated.college, "IIT Delhi");
        assert_eq!(updated.role, Role::Junior);
        assert_eq!(harness.session().identity(), Some(updated));
    }

    #[tokio::test]
    async fn mentorship_flag_only_for_mentors() {
        let junior = signed_in(Role::Junior).await;
        let updated = junior
            .controller
            .update_profile(ProfileEdit {
                available_for_mentorship: Some(true),
                ..ProfileEdit::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.available_for_mentorship, None);
        assert_eq!(junior.profiles.call_count(RepositoryCall::Update), 0);

        let mentor = signed_in(Role::Mentor).await;
        let updated = mentor
            .controller
            .update_profile(ProfileEdit {
                available_for_mentorship: Some(true),
                ..ProfileEdit::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.available_for_mentorship, Some(true));
    }

    #[tokio::test]
    async fn failed_update_keeps_session() {
        let harness = signed_in(Role::Junior).await;
        let before = harness.session().identity();
        harness.profiles.fail_next(
            RepositoryCall::Update,
            RepositoryError::Backend("timeout".into()),
        );

        let err = harness
            .controller
            .update_profile(ProfileEdit {
                name: Some("Changed".into()),
                ..ProfileEdit::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::ProfileUpdateFailed);
        assert_eq!(harness.session().identity(), before);
        assert!(!harness.session().is_loading());
    }

    #[tokio::test]
    async fn join_and_leave_use_set_semantics() {
        let harness = signed_in(Role::Junior).await;

        harness.controller.join(Membership::Community, "coding").await.unwrap();
        let profile = harness
            .controller
            .join(Membership::Community, "coding")
            .await
            .unwrap();
        assert_eq!(profile.joined_communities.len(), 1);
        assert_eq!(harness.profiles.call_count(RepositoryCall::Update), 1);

        let profile = harness.controller.leave(Membership::Community, "coding").await.unwrap();
        assert!(profile.joined_communities.is_empty());

        harness.controller.leave(Membership::Community, "coding").await.unwrap();
        assert_eq!(harness.profiles.call_count(RepositoryCall::Update), 2);
    }

    #[tokio::test]
    async fn clubs_are_independent_of_communities() {
        let harness = signed_in(Role::Mentor).await;

        let profile = harness.controller.join(Membership::Club, "robotics").await.unwrap();

        assert!(profile.joined_clubs.contains("robotics"));
        assert!(profile.joined_communities.is_empty());
    }

    #[tokio::test]
    async fn only_juniors_connect_with_mentors() {
        let junior = signed_in(Role::Junior).await;
        let profile = junior.controller.join(Membership::Mentor, "mentor-1").await.unwrap();
        assert!(profile.connected_mentors.contains("mentor-1"));

        let mentor = signed_in(Role::Mentor).await;
        let err = mentor
            .controller
            .join(Membership::Mentor, "mentor-2")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InsufficientPermissions);
    }

    #[tokio::test]
    async fn require_role_honours_admin_privilege() {
        let admin = signed_in(Role::Admin).await;
        assert!(admin.controller.require_role(Role::Mentor).is_ok());
        assert!(admin.controller.require_role(Role::Admin).is_ok());

        let junior = signed_in(Role::Junior).await;
        assert!(junior.controller.require_role(Role::Junior).is_ok());
        assert_eq!(
            junior.controller.require_role(Role::Admin).unwrap_err(),
            AuthError::InsufficientPermissions
        );
    }
}
