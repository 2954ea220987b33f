// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Hosted Backend
//!
//! Identity backend and profile repository backed by a hosted auth + REST
//! table service.
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | Password sign-in | `POST /auth/v1/token?grant_type=password` |
//! | Sign-up | `POST /auth/v1/signup` |
//! | Sign-out | `POST /auth/v1/logout` |
//! | Refresh | `POST /auth/v1/token?grant_type=refresh_token` |
//! | OAuth start | `GET /auth/v1/authorize?provider=…&redirect_to=…` (built locally) |
//! | Profiles | `GET/POST/PATCH /rest/v1/{table}?id=eq.{id}` |
//!
//! Every request carries the `apikey` header; requests made while signed in
//! also carry the access token as a bearer token.

pub mod client;
pub mod identity;
pub mod persistence;
pub mod profiles;
pub mod refresher;

pub use client::HostedClient;
pub use identity::HostedIdentityBackend;
pub use persistence::SessionFile;
pub use profiles::HostedProfileRepository;
pub use refresher::{RefreshStep, SessionRefresher};
