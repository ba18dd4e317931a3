//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Git Relay Server — thin entry point for the Axum HTTP service.
//!
//! All routing logic lives in `relay_platform::http::create_router`. This
//! binary is responsible only for: env config loading, service wiring
//! (session store, repo manager, transport crypto), the TTL sweep task,
//! server binding, and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use relay_core::git_ops::GitIdentity;
use relay_core::transport::TransportCrypto;
use relay_platform::http::{create_router, AppState};
use relay_platform::repo_manager::RepoManager;
use relay_platform::session_store::{spawn_ttl_sweeper, SessionStore};
use relay_platform::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::from_env()?);

    tracing::info!(
        "relay-server v{} starting on port {}",
        env!("CARGO_PKG_VERSION"),
        config.port
    );
    tracing::info!(mode = ?config.transport_mode, "transport crypto mode");

    let sessions = Arc::new(SessionStore::new(config.sessions_dir.clone()));
    let repos = Arc::new(RepoManager::new(
        config.repos_dir.clone(),
        config.github_pat.clone(),
        GitIdentity {
            author_name: config.git_author_name.clone(),
            author_email: config.git_author_email.clone(),
            committer_name: config.git_committer_name.clone(),
            committer_email: config.git_committer_email.clone(),
        },
        config.git_op_timeout,
    ));
    let transport = Arc::new(TransportCrypto::new(
        config.transport_mode,
        config.v1_key.clone(),
        config.v2_key.clone(),
    ));

    let _sweeper = spawn_ttl_sweeper(
        sessions.clone(),
        config.session_ttl_ms,
        Duration::from_millis(config.cleanup_interval_ms as u64),
    );

    let state = AppState::new(config.clone(), sessions, repos, transport);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections...");
}
