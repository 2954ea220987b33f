// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile repository layer.
//!
//! A keyed record store holding one [`Profile`] per identity. The controller
//! reads and writes single records by identity key; there is no transaction
//! spanning two calls.

pub mod memory;

use async_trait::async_trait;

use crate::models::{IdentityId, Profile, ProfilePatch};

pub use memory::{InMemoryProfileRepository, RepositoryCall};

/// Error type for profile repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// No record for the key
    #[error("Not found: {0}")]
    NotFound(String),
    /// Insert collided with an existing record
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Store unreachable or refused the request
    #[error("Profile store error: {0}")]
    Backend(String),
    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Keyed profile store.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch exactly one profile.
    async fn get(&self, id: &IdentityId) -> RepositoryResult<Profile>;

    /// Create a profile. Fails with `AlreadyExists` if the key is taken.
    async fn insert(&self, profile: &Profile) -> RepositoryResult<()>;

    /// Apply a partial update. Fails with `NotFound` if the key is absent.
    async fn update(&self, id: &IdentityId, patch: &ProfilePatch) -> RepositoryResult<()>;
}
