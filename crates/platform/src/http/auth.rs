//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! `x-server-key` authentication middleware, applied to every `/api/*`
//! route before any decryption work runs.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use relay_core::error::RelayError;

use super::error_response::ApiError;
use super::state::AppState;

const HEADER_NAME: &str = "x-server-key";

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(HEADER_NAME)
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(key) if key == state.config.api_key.expose_secret() => Ok(next.run(request).await),
        _ => Err(ApiError(RelayError::unauthorized())),
    }
}
