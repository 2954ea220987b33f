// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};

/// User roles stored on the profile record.
///
/// ## Role Hierarchy
///
/// - `Admin` - Moderation and admin panel access, implies every other role
/// - `Mentor` - Senior student offering mentorship
/// - `Junior` - Default role for new members
///
/// The role only changes through admin-code elevation at sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Mentor (may toggle mentorship availability)
    Mentor,
    /// Junior member (may connect to mentors)
    Junior,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            // Admin can do anything
            (Role::Admin, _) => true,
            (Role::Mentor, Role::Mentor) => true,
            (Role::Junior, Role::Junior) => true,
            _ => false,
        }
    }
}

impl Default for Role {
    /// New members start as juniors.
    fn default() -> Self {
        Role::Junior
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Mentor => write!(f, "mentor"),
            Role::Junior => write!(f, "junior"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_all_privileges() {
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::Admin.has_privilege(Role::Mentor));
        assert!(Role::Admin.has_privilege(Role::Junior));
    }

    #[test]
    fn junior_only_has_junior_privilege() {
        assert!(!Role::Junior.has_privilege(Role::Admin));
        assert!(!Role::Junior.has_privilege(Role::Mentor));
        assert!(Role::Junior.has_privilege(Role::Junior));
    }

    #[test]
    fn mentor_is_not_admin() {
        assert!(!Role::Mentor.has_privilege(Role::Admin));
        assert!(Role::Mentor.has_privilege(Role::Mentor));
    }

    #[test]
    fn default_role_is_junior() {
        assert_eq!(Role::default(), Role::Junior);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Mentor).unwrap(), r#""mentor""#);
        let role: Role = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(role, Role::Admin);
    }
}
