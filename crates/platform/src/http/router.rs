//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Axum router composition for the git relay's HTTP layer.
//!
//! Routes:
//!   GET   /health                   — health check, no auth
//!   POST  /api/data/chunk           — upload one chunk
//!   POST  /api/data/complete        — mark a session's upload complete
//!   GET   /api/data/status/:id      — poll session status
//!   POST  /api/gr/process           — finalize onto a Git repository
//!   GET   /api/gr/remote-info       — query a remote branch's tip
//!   POST  /api/file/store           — finalize as a durable stored file
//!
//! Middleware ordering on `/api/*`: `auth_middleware` (outermost, runs
//! first) gates on `x-server-key` before `envelope_middleware` spends any
//! effort decrypting the body — matching the spec's "client → auth →
//! envelope decrypt → route handler" pipeline.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::{auth::auth_middleware, envelope::envelope_middleware, handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/data/chunk", post(handlers::chunk_handler))
        .route("/data/complete", post(handlers::complete_handler))
        .route("/data/status/:session_id", get(handlers::status_handler))
        .route("/gr/process", post(handlers::process_handler))
        .route("/gr/remote-info", get(handlers::remote_info_handler))
        .route("/file/store", post(handlers::file_store_handler))
        .layer(middleware::from_fn_with_state(state.clone(), envelope_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let max_body = state.config.max_request_body_bytes;

    Router::new()
        .route("/health", get(handlers::health_handler))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
