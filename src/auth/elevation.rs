// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-code role elevation.
//!
//! A shared-secret string compared verbatim at sign-in. This is a
//! placeholder mechanism: there is no hashing and no rate limiting, and any
//! holder of the code can make any account an admin.

/// Shared-secret elevation code.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCode(String);

impl AdminCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Whether `candidate` grants elevation. An empty configured code never
    /// matches.
    pub fn matches(&self, candidate: Option<&str>) -> bool {
        match candidate {
            Some(candidate) => !self.0.is_empty() && candidate == self.0,
            None => false,
        }
    }
}

impl std::fmt::Debug for AdminCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminCode(<redacted>)")
    }
}
