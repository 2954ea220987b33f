// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Profile Data Models
//!
//! This module defines the profile record stored in the profile repository
//! and the value types used to create and modify it.
//!
//! ## Identity Type
//!
//! The [`IdentityId`] newtype wraps the opaque principal id issued by the
//! identity backend. The same key addresses the matching [`Profile`].
//!
//! ## Model Categories
//!
//! - **Profile**: the durable per-user record (role, memberships, details)
//! - **ProfileDraft**: sign-up input, turned into a full profile with defaults
//! - **ProfilePatch**: partial repository update
//! - **ProfileEdit**: the subset of fields a user may change on their own

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::roles::Role;

/// Age assigned when a sign-up draft does not carry one.
pub const DEFAULT_AGE: u32 = 18;

// =============================================================================
// Identity Type
// =============================================================================

/// Opaque principal id issued by the identity backend.
///
/// # Example
///
/// ```rust,ignore
/// let id = IdentityId::from("3f4d6542-b8ce-4226-93d3-80d6f14d6db2");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IdentityId {
    fn from(value: String) -> Self {
        IdentityId(value)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        IdentityId(value.to_string())
    }
}

impl From<IdentityId> for String {
    fn from(value: IdentityId) -> Self {
        value.0
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Membership list selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// `joined_communities`
    Community,
    /// `joined_clubs`
    Club,
    /// `connected_mentors`
    Mentor,
}

impl std::fmt::Display for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Membership::Community => write!(f, "community"),
            Membership::Club => write!(f, "club"),
            Membership::Mentor => write!(f, "mentor"),
        }
    }
}

/// Durable user profile, keyed by identity id.
///
/// Membership lists are sets of foreign keys; their order carries no meaning.
/// They are not checked against existing communities, clubs or users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: IdentityId,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Avatar reference (URL or bundled picture name).
    pub profile_pic: String,
    pub age: u32,
    pub college: String,
    pub stream: String,
    /// Only meaningful for mentors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_for_mentorship: Option<bool>,
    #[serde(default)]
    pub joined_communities: BTreeSet<String>,
    #[serde(default)]
    pub joined_clubs: BTreeSet<String>,
    #[serde(default)]
    pub connected_mentors: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Build the complete record created at sign-up.
    ///
    /// | Field | Default |
    /// |-------|---------|
    /// | `name`, `profile_pic`, `college`, `stream` | empty string |
    /// | `role` | [`Role::Junior`] |
    /// | `age` | [`DEFAULT_AGE`] (also when the draft carries `0`) |
    /// | `available_for_mentorship` | `Some(false)` for mentors, `None` otherwise |
    /// | membership lists | empty |
    pub fn from_draft(id: IdentityId, draft: &ProfileDraft) -> Self {
        let role = draft.role.unwrap_or_default();

        Self {
            id,
            name: draft.name.clone().unwrap_or_default(),
            email: draft.email.clone().unwrap_or_default(),
            role,
            profile_pic: draft.profile_pic.clone().unwrap_or_default(),
            age: draft.age.filter(|age| *age > 0).unwrap_or(DEFAULT_AGE),
            college: draft.college.clone().unwrap_or_default(),
            stream: draft.stream.clone().unwrap_or_default(),
            available_for_mentorship: (role == Role::Mentor).then_some(false),
            joined_communities: BTreeSet::new(),
            joined_clubs: BTreeSet::new(),
            connected_mentors: BTreeSet::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn memberships(&self, kind: Membership) -> &BTreeSet<String> {
        match kind {
            Membership::Community => &self.joined_communities,
            Membership::Club => &self.joined_clubs,
            Membership::Mentor => &self.connected_mentors,
        }
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }
}

// =============================================================================
// Sign-up Draft
// =============================================================================

/// Sign-up input. Every field is optional; [`Profile::from_draft`] fills the
/// gaps. `email` and `password` are checked before the backend is contacted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub profile_pic: Option<String>,
    pub age: Option<u32>,
    pub college: Option<String>,
    pub stream: Option<String>,
}

impl ProfileDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn profile_pic(mut self, profile_pic: impl Into<String>) -> Self {
        self.profile_pic = Some(profile_pic.into());
        self
    }

    pub fn age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn college(mut self, college: impl Into<String>) -> Self {
        self.college = Some(college.into());
        self
    }

    pub fn stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into());
        self
    }

    /// Email and password, if both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let email = self.email.as_deref().filter(|e| !e.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((email, password))
    }
}

// =============================================================================
// Partial Updates
// =============================================================================

/// Partial profile update sent to the repository.
///
/// Absent fields are left untouched and are not serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_for_mentorship: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_communities: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_clubs: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_mentors: Option<BTreeSet<String>>,
}

impl ProfilePatch {
    /// The admin-code elevation write.
    pub fn elevate_to_admin() -> Self {
        Self {
            role: Some(Role::Admin),
            ..Self::default()
        }
    }

    /// Replace one membership list wholesale.
    pub fn memberships(kind: Membership, keys: BTreeSet<String>) -> Self {
        let mut patch = Self::default();
        match kind {
            Membership::Community => patch.joined_communities = Some(keys),
            Membership::Club => patch.joined_clubs = Some(keys),
            Membership::Mentor => patch.connected_mentors = Some(keys),
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the present fields to a stored record.
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(role) = self.role {
            profile.role = role;
        }
        if let Some(profile_pic) = &self.profile_pic {
            profile.profile_pic = profile_pic.clone();
        }
        if let Some(age) = self.age {
            profile.age = age;
        }
        if let Some(college) = &self.college {
            profile.college = college.clone();
        }
        if let Some(stream) = &self.stream {
            profile.stream = stream.clone();
        }
        if let Some(available) = self.available_for_mentorship {
            profile.available_for_mentorship = Some(available);
        }
        if let Some(keys) = &self.joined_communities {
            profile.joined_communities = keys.clone();
        }
        if let Some(keys) = &self.joined_clubs {
            profile.joined_clubs = keys.clone();
        }
        if let Some(keys) = &self.connected_mentors {
            profile.connected_mentors = keys.clone();
        }
    }
}

/// Fields a signed-in user may change on their own profile.
///
/// Role is deliberately absent: it only changes through admin-code elevation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub college: Option<String>,
    pub stream: Option<String>,
    pub profile_pic: Option<String>,
    /// Applied only when the profile's role is mentor.
    pub available_for_mentorship: Option<bool>,
}

impl ProfileEdit {
    /// Convert into a repository patch for a profile holding `role`.
    pub fn into_patch(self, role: Role) -> ProfilePatch {
        ProfilePatch {
            name: self.name,
            age: self.age,
            college: self.college,
            stream: self.stream,
            profile_pic: self.profile_pic,
            available_for_mentorship: self
                .available_for_mentorship
                .filter(|_| role == Role::Mentor),
            ..ProfilePatch::default()
        }
    }
}
