// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Client-side authentication lifecycle for U-fresher members.
//!
//! ## Auth Flow
//!
//! 1. On startup the [`AuthController`] asks the identity backend for an
//!    existing session and, if there is one, publishes the matching profile.
//! 2. Password sign-in, sign-up and Google OAuth go through the controller;
//!    each publishes the resulting profile to the [`SessionStore`].
//! 3. Out-of-band backend notifications (another tab, a redirect
//!    completion, a token refresh) are applied by a listener task.
//!
//! ## Roles
//!
//! - Profiles carry one [`Role`]; new accounts are juniors unless the
//!   sign-up form chose otherwise
//! - A correct admin code at sign-in elevates the stored role to admin
//! - The code is a shared secret shipped with the client, so elevation is a
//!   convenience gate, not a security boundary
//!
//! [`SessionStore`]: crate::session::SessionStore

pub mod account;
pub mod callback;
pub mod claims;
pub mod controller;
pub mod elevation;
pub mod error;
pub mod roles;

pub use callback::CallbackRoute;
pub use claims::AccessTokenClaims;
pub use controller::{AuthController, AuthSettings, AuthSubscription, OAUTH_CALLBACK_PATH};
pub use elevation::AdminCode;
pub use error::{AuthError, AuthOutcome, AuthResult};
pub use roles::Role;
