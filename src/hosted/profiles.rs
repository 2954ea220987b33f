// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`ProfileRepository`] over the hosted REST table endpoint.
//!
//! Rows are addressed with `?id=eq.{id}`; reads and updates return arrays,
//! so an empty array means the key does not exist.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::client::{HostedClient, HttpFailure};
use crate::models::{IdentityId, Profile, ProfilePatch};
use crate::profiles::{ProfileRepository, RepositoryError, RepositoryResult};

pub struct HostedProfileRepository {
    client: Arc<HostedClient>,
    table: String,
}

impl HostedProfileRepository {
    pub fn new(client: Arc<HostedClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn table_path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    fn row_path(&self, id: &IdentityId) -> String {
        let filter: String =
            url::form_urlencoded::byte_serialize(format!("eq.{id}").as_bytes()).collect();
        format!("{}?id={filter}", self.table_path())
    }

    fn map_failure(&self, id: &IdentityId, failure: HttpFailure) -> RepositoryError {
        match failure {
            HttpFailure::Transport(message) => RepositoryError::Backend(message),
            HttpFailure::Status { status, .. } if status == StatusCode::CONFLICT => {
                RepositoryError::AlreadyExists(format!("Profile {id}"))
            }
            HttpFailure::Status { status, message } => {
                RepositoryError::Backend(format!("{status}: {message}"))
            }
        }
    }

    fn single_row(&self, id: &IdentityId, body: &str) -> RepositoryResult<Profile> {
        let rows: Vec<Profile> = serde_json::from_str(body)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile {id}")))
    }
}

#[async_trait]
impl ProfileRepository for HostedProfileRepository {
    async fn get(&self, id: &IdentityId) -> RepositoryResult<Profile> {
        let path = format!("{}&select=*", self.row_path(id));
        let request = self.client.request(Method::GET, &path);

        let body = self
            .client
            .send(request, "load profile")
            .await
            .map_err(|f| self.map_failure(id, f))?;
        self.single_row(id, &body)
    }

    async fn insert(&self, profile: &Profile) -> RepositoryResult<()> {
        let request = self
            .client
            .request(Method::POST, &self.table_path())
            .header("Prefer", "return=minimal")
            .json(profile);

        self.client
            .send(request, "insert profile")
            .await
            .map_err(|f| self.map_failure(&profile.id, f))?;
        debug!(user_id = %profile.id, table = %self.table, "Inserted profile");
        Ok(())
    }

    async fn update(&self, id: &IdentityId, patch: &ProfilePatch) -> RepositoryResult<()> {
        let request = self
            .client
            .request(Method::PATCH, &self.row_path(id))
            .header("Prefer", "return=representation")
            .json(patch);

        let body = self
            .client
            .send(request, "update profile")
            .await
            .map_err(|f| self.map_failure(id, f))?;
        self.single_row(id, &body).map(|_| ())
    }
}
