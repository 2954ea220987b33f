// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Refresher
//!
//! Background task that keeps the hosted session's access token fresh.
//!
//! ## Strategy
//!
//! Every `check_interval` (default 15 s) the refresher looks at the current
//! session. If its access token expires within `margin`, the refresh token
//! is exchanged for a new session, which broadcasts `TOKEN_REFRESHED`. A
//! rejected refresh token ends the session with `SIGNED_OUT`. Transport
//! failures are retried on the next tick.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::HostedClient;

/// Default interval between expiry checks.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// What one check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStep {
    NoSession,
    Fresh,
    Refreshed,
    SignedOut,
    Failed,
}

pub struct SessionRefresher {
    client: Arc<HostedClient>,
    margin: chrono::Duration,
    check_interval: Duration,
}

impl SessionRefresher {
    pub fn new(client: Arc<HostedClient>, margin: Duration) -> Self {
        Self {
            client,
            margin: chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::days(1)),
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Run the refresh loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(refresher.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            margin_secs = self.margin.num_seconds(),
            "Session refresher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Session refresher shutting down");
                return;
            }

            self.step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session refresher shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one check.
    pub async fn step(&self) -> RefreshStep {
        let Some(session) = self.client.current_session() else {
            return RefreshStep::NoSession;
        };

        if !session.expires_within(self.margin, Utc::now()) {
            return RefreshStep::Fresh;
        }

        debug!(user_id = %session.identity_id(), "Access token close to expiry");
        match self.client.refresh_session().await {
            Ok(Some(_)) => RefreshStep::Refreshed,
            Ok(None) => RefreshStep::NoSession,
            Err(e) if e.is_rejected() => RefreshStep::SignedOut,
            Err(e) => {
                warn!(
                    user_id = %session.identity_id(),
                    error = %e,
                    "Session refresh failed; retrying later"
                );
                RefreshStep::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosted::client::tests::test_config;
    use crate::identity::{AuthEvent, BackendSession, Principal};

    fn client(url: &str) -> Arc<HostedClient> {
        Arc::new(HostedClient::new(&test_config(url), None).unwrap())
    }

    fn session(expires_in: chrono::Duration) -> BackendSession {
        BackendSession {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Some(Utc::now() + expires_in),
            principal: Principal {
                id: "user-1".into(),
                email: None,
                metadata: Default::default(),
            },
        }
    }

    #[tokio::test]
    async fn idle_without_session() {
        let refresher = SessionRefresher::new(client("https://db.example.com"), Duration::from_secs(60));
        assert_eq!(refresher.step().await, RefreshStep::NoSession);
    }

    #[tokio::test]
    async fn fresh_tokens_are_left_alone() {
        let client = client("https://db.example.com");
        client.set_session(Some(session(chrono::Duration::hours(1))), AuthEvent::SignedIn);

        let refresher = SessionRefresher::new(client, Duration::from_secs(60));
        assert_eq!(refresher.step().await, RefreshStep::Fresh);
    }

    #[tokio::test]
    async fn unreachable_service_keeps_session_for_retry() {
        let client = client("http://127.0.0.1:9");
        client.set_session(Some(session(chrono::Duration::seconds(10))), AuthEvent::SignedIn);

        let refresher = SessionRefresher::new(client.clone(), Duration::from_secs(60));
        assert_eq!(refresher.step().await, RefreshStep::Failed);
        assert!(client.current_session().is_some());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let refresher = SessionRefresher::new(client("https://db.example.com"), Duration::from_secs(60))
            .with_check_interval(Duration::from_millis(10));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(refresher.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
