// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Store
//!
//! Holds the published session (`identity` + `loading`) for one running
//! client. The store is an explicit object handed to whoever needs it; it is
//! cheap to clone and every clone shares the same state.
//!
//! ## Publishing
//!
//! State is published through a `tokio::sync::watch` channel: readers take a
//! [`snapshot`](SessionStore::snapshot) or [`subscribe`](SessionStore::subscribe)
//! to be woken on every change.
//!
//! ## Loading Flag
//!
//! `loading` starts true and stays up until the first operation begins
//! (normally the initial restore). After that it is true exactly while some
//! [`LoadingGuard`] is alive. Guards are released on drop, so every exit path
//! of an operation (including a dropped future) resets the flag.
//!
//! ## Generations
//!
//! Every profile load takes a [`Generation`] ticket before it starts and
//! publishes with [`publish_if_current`](SessionStore::publish_if_current).
//! A load whose ticket has been superseded (by a newer load, a sign-out or a
//! raw `set_identity`) is discarded instead of overwriting newer state.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::models::Profile;

/// Published session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Present only after a profile was loaded for a verified session.
    pub identity: Option<Profile>,
    pub loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Ticket identifying one in-flight profile load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

struct Counters {
    generation: u64,
    in_flight: usize,
    /// Set until the first guard is taken.
    initial: bool,
}

struct Inner {
    state: watch::Sender<SessionState>,
    counters: Mutex<Counters>,
}

impl Inner {
    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh_loading(&self, counters: &Counters) {
        let loading = counters.initial || counters.in_flight > 0;
        self.state.send_if_modified(|state| {
            if state.loading == loading {
                false
            } else {
                state.loading = loading;
                true
            }
        });
    }
}

/// Shared, observable session state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// New store in the initial `Unauthenticated(loading)` state. The loading
    /// flag stays up until the first operation guard is dropped.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState {
            identity: None,
            loading: true,
        });
        Self {
            inner: Arc::new(Inner {
                state,
                counters: Mutex::new(Counters {
                    generation: 0,
                    in_flight: 0,
                    initial: true,
                }),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Profile> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Receiver that observes every published change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Mark an operation as in flight until the guard is dropped. The first
    /// guard also ends the initial loading window.
    pub fn begin_operation(&self) -> LoadingGuard {
        let mut counters = self.inner.counters();
        counters.initial = false;
        counters.in_flight += 1;
        self.inner.refresh_loading(&counters);
        LoadingGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Take a ticket for a load that is about to start.
    pub fn next_generation(&self) -> Generation {
        let mut counters = self.inner.counters();
        counters.generation += 1;
        Generation(counters.generation)
    }

    /// Publish `profile` if no newer ticket was issued since `generation`.
    /// Returns whether the profile was published.
    pub fn publish_if_current(&self, generation: Generation, profile: Profile) -> bool {
        let counters = self.inner.counters();
        if counters.generation != generation.0 {
            debug!(
                generation = generation.0,
                current = counters.generation,
                user_id = %profile.id,
                "Discarding stale profile load"
            );
            return false;
        }
        self.inner.state.send_modify(|state| state.identity = Some(profile));
        true
    }

    /// Drop the identity and supersede every load in flight.
    pub fn clear(&self) {
        self.set_identity(None);
    }

    /// Raw identity setter for redirect-completion code paths.
    ///
    /// Supersedes every load in flight, like [`clear`](Self::clear).
    pub fn set_identity(&self, identity: Option<Profile>) {
        let mut counters = self.inner.counters();
        counters.generation += 1;
        self.inner.state.send_modify(|state| state.identity = identity);
    }
}

/// Keeps `loading` raised while alive.
#[must_use = "loading is released as soon as the guard is dropped"]
pub struct LoadingGuard {
    inner: Arc<Inner>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut counters = self.inner.counters();
        counters.in_flight = counters.in_flight.saturating_sub(1);
        self.inner.refresh_loading(&counters);
    }
}
