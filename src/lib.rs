// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! U-fresher Session - client session and authentication lifecycle
//!
//! This crate owns the signed-in state of a U-fresher client: who is signed
//! in, which profile and role they carry, and whether an auth operation is
//! in flight. The identity service and the profile table sit behind traits
//! with in-memory and hosted implementations.
//!
//! ## Modules
//!
//! - `auth` - Lifecycle controller, roles, admin-code elevation, OAuth callback
//! - `session` - Observable `{identity, loading}` store
//! - `identity` - Identity backend contract and in-memory backend
//! - `profiles` - Profile repository contract and in-memory repository
//! - `hosted` - Hosted REST implementations, session file, token refresher
//! - `models` - Profile records, drafts, patches
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup

pub mod auth;
pub mod config;
pub mod hosted;
pub mod identity;
pub mod logging;
pub mod models;
pub mod profiles;
pub mod session;
