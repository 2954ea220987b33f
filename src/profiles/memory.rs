// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory profile repository.
//!
//! Stands in for the hosted profile table during local development and in
//! tests. Records every write so tests can assert on exactly what was sent,
//! and supports one-shot failures and artificial read latency.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{ProfileRepository, RepositoryError, RepositoryResult};
use crate::models::{IdentityId, Profile, ProfilePatch};

/// Repository operations, for call-count assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryCall {
    Get,
    Insert,
    Update,
}

#[derive(Default)]
struct RepositoryState {
    profiles: HashMap<IdentityId, Profile>,
    calls: HashMap<RepositoryCall, usize>,
    inserts: Vec<Profile>,
    updates: Vec<(IdentityId, ProfilePatch)>,
    failures: HashMap<RepositoryCall, RepositoryError>,
    get_delay: Option<Duration>,
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    state: Mutex<RepositoryState>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RepositoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a record without counting it as a call.
    pub fn seed(&self, profile: Profile) {
        self.lock().profiles.insert(profile.id.clone(), profile);
    }

    /// Read a record without counting it as a call.
    pub fn peek(&self, id: &IdentityId) -> Option<Profile> {
        self.lock().profiles.get(id).cloned()
    }

    /// Make the next call of the given kind fail with `error`.
    pub fn fail_next(&self, call: RepositoryCall, error: RepositoryError) {
        self.lock().failures.insert(call, error);
    }

    /// Delay every `get` by `delay` before it reads the record.
    pub fn delay_gets(&self, delay: Option<Duration>) {
        self.lock().get_delay = delay;
    }

    pub fn call_count(&self, call: RepositoryCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn inserts(&self) -> Vec<Profile> {
        self.lock().inserts.clone()
    }

    pub fn updates(&self) -> Vec<(IdentityId, ProfilePatch)> {
        self.lock().updates.clone()
    }

    fn enter(&self, call: RepositoryCall) -> RepositoryResult<()> {
        let mut state = self.lock();
        *state.calls.entry(call).or_insert(0) += 1;
        match state.failures.remove(&call) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get(&self, id: &IdentityId) -> RepositoryResult<Profile> {
        self.enter(RepositoryCall::Get)?;

        let delay = self.lock().get_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.lock()
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile {id}")))
    }

    async fn insert(&self, profile: &Profile) -> RepositoryResult<()> {
        self.enter(RepositoryCall::Insert)?;

        let mut state = self.lock();
        if state.profiles.contains_key(&profile.id) {
            return Err(RepositoryError::AlreadyExists(format!(
                "Profile {}",
                profile.id
            )));
        }
        state.inserts.push(profile.clone());
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update(&self, id: &IdentityId, patch: &ProfilePatch) -> RepositoryResult<()> {
        self.enter(RepositoryCall::Update)?;

        let mut state = self.lock();
        let Some(profile) = state.profiles.get_mut(id) else {
            return Err(RepositoryError::NotFound(format!("Profile {id}")));
        };
        patch.apply(profile);
        profile.updated_at = Some(Utc::now());
        state.updates.push((id.clone(), patch.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::models::ProfileDraft;

    fn test_profile(id: &str) -> Profile {
        Profile::from_draft(
            IdentityId::from(id),
            &ProfileDraft::new().email(format!("{id}@example.com")).name("Test"),
        )
    }

    #[tokio::test]
    async fn insert_and_get_profile() {
        let repo = InMemoryProfileRepository::new();
        let profile = test_profile("user-1");

        repo.insert(&profile).await.unwrap();
        let loaded = repo.get(&profile.id).await.unwrap();

        assert_eq!(loaded, profile);
        assert_eq!(repo.inserts(), vec![profile]);
        assert_eq!(repo.call_count(RepositoryCall::Get), 1);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_key() {
        let repo = InMemoryProfileRepository::new();
        let profile = test_profile("user-1");
        repo.seed(profile.clone());

        let err = repo.insert(&profile).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_applies_patch_and_stamps_time() {
        let repo = InMemoryProfileRepository::new();
        let profile = test_profile("user-1");
        repo.seed(profile.clone());

        repo.update(&profile.id, &ProfilePatch::elevate_to_admin())
            .await
            .unwrap();

        let stored = repo.peek(&profile.id).unwrap();
        assert_eq!(stored.role, Role::Admin);
        assert!(stored.updated_at.is_some());
        assert_eq!(repo.updates().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_profile_is_not_found() {
        let repo = InMemoryProfileRepository::new();
        let err = repo
            .update(&IdentityId::from("missing"), &ProfilePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_failure_applies_to_one_call() {
        let repo = InMemoryProfileRepository::new();
        let profile = test_profile("user-1");
        repo.seed(profile.clone());
        repo.fail_next(RepositoryCall::Get, RepositoryError::Backend("down".into()));

        assert!(repo.get(&profile.id).await.is_err());
        assert!(repo.get(&profile.id).await.is_ok());
    }
}
