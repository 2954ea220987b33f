// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session probe: restores the stored session against the hosted service,
//! keeps its token fresh and logs every published session state until
//! Ctrl-C.

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ufresher_session::auth::{AuthController, AuthSettings};
use ufresher_session::config::AppConfig;
use ufresher_session::hosted::{
    HostedClient, HostedIdentityBackend, HostedProfileRepository, SessionFile, SessionRefresher,
};
use ufresher_session::logging;
use ufresher_session::session::SessionStore;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init(Default::default());
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(config.log_format);

    let backend_config = match config.require_backend() {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Hosted backend is not configured");
            return ExitCode::FAILURE;
        }
    };
    let settings = match AuthSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, app_url = %config.app_url, "Cannot derive OAuth callback URL");
            return ExitCode::FAILURE;
        }
    };

    let session_file = config.session_file.clone().map(SessionFile::new);
    let client = match HostedClient::new(backend_config, session_file) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to build hosted client");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let refresher = SessionRefresher::new(client.clone(), config.refresh_margin);
    let refresher_handle = tokio::spawn(refresher.run(shutdown.clone()));

    let controller = Arc::new(AuthController::new(
        Arc::new(HostedIdentityBackend::new(client.clone())),
        Arc::new(HostedProfileRepository::new(
            client,
            config.profiles_table.clone(),
        )),
        SessionStore::new(),
        settings,
    ));

    let mut states = controller.session().subscribe();
    let subscription = controller.start().await;

    let state = controller.session().snapshot();
    info!(
        authenticated = state.is_authenticated(),
        user_id = ?state.identity.as_ref().map(|p| p.id.to_string()),
        role = ?state.identity.as_ref().map(|p| p.role),
        "Session restored"
    );

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                info!(
                    authenticated = state.is_authenticated(),
                    loading = state.loading,
                    user_id = ?state.identity.as_ref().map(|p| p.id.to_string()),
                    role = ?state.identity.as_ref().map(|p| p.role),
                    "Session state changed"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    info!("Shutting down");
    shutdown.cancel();
    subscription.shutdown().await;
    if let Err(e) = refresher_handle.await {
        warn!(error = %e, "Session refresher ended abnormally");
    }

    ExitCode::SUCCESS
}
