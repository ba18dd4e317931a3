//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Envelope decryption middleware.
//!
//! For non-`GET`/`HEAD` requests, if the JSON body carries a string field
//! `gameData`, it's base64-decoded, run through [`TransportCrypto`], and
//! replaced by the decrypted metadata object; the decrypted binary tail
//! rides along as a side channel via [`DecryptedPayload`]. A body with no
//! `gameData` field passes through unchanged (legacy, unencrypted
//! routes). v2 envelopes additionally go through replay validation.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde_json::{Map, Value};

use relay_core::error::RelayError;
use relay_core::transport::{replay, Frame};

use super::error_response::ApiError;
use super::state::AppState;

const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// The decrypted request body, attached to request extensions by
/// [`envelope_middleware`] for handlers to pull out explicitly.
#[derive(Clone, Default)]
pub struct DecryptedPayload {
    pub metadata: Map<String, Value>,
    pub binary: Vec<u8>,
}

pub async fn envelope_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if matches!(*request.method(), axum::http::Method::GET | axum::http::Method::HEAD) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError(RelayError::invalid_input(format!("failed to read request body: {e}"))))?;

    let payload = if bytes.is_empty() {
        DecryptedPayload::default()
    } else {
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError(RelayError::invalid_input(format!("request body is not valid JSON: {e}"))))?;

        let mut object = match value {
            Value::Object(map) => map,
            _ => return Err(ApiError(RelayError::invalid_input("request body must be a JSON object"))),
        };

        match object.remove("gameData").and_then(|v| v.as_str().map(str::to_string)) {
            Some(encoded) => decrypt_envelope(&state, &encoded)?,
            None => DecryptedPayload {
                metadata: object,
                binary: Vec::new(),
            },
        }
    };

    let mut request = Request::from_parts(parts, Body::empty());
    request.extensions_mut().insert(payload);

    Ok(next.run(request).await)
}

fn decrypt_envelope(state: &AppState, encoded: &str) -> Result<DecryptedPayload, ApiError> {
    let envelope_bytes = BASE64
        .decode(encoded)
        .map_err(|e| ApiError(RelayError::decryption_failed(format!("gameData is not valid base64: {e}"))))?;

    let is_v2 = envelope_bytes.starts_with(relay_core::transport::V2_MAGIC.as_slice());

    let plaintext = state.transport.decrypt(&envelope_bytes).map_err(ApiError)?;
    let frame = Frame::parse(&plaintext).map_err(ApiError)?;

    let metadata = if is_v2 {
        replay::validate(frame.metadata, &state.replay_cache, state.config.replay_policy, Utc::now().timestamp_millis())
            .map_err(ApiError)?
    } else {
        frame.metadata
    };

    Ok(DecryptedPayload {
        metadata,
        binary: frame.binary,
    })
}
