//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Route handlers for the git relay's HTTP surface.
//!
//! Finalize routes (`/gr/process`, `/file/store`) follow the same shape:
//! validate, call `startProcessing` for the at-most-once guard, send the
//! `202` response, then spawn a background task whose only externally
//! visible effect is a terminal write back to the [`SessionStore`] — the
//! response path never awaits Git or file I/O.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use relay_core::error::RelayError;
use relay_types::{SessionSnapshot, SessionStatus};

use super::envelope::DecryptedPayload;
use super::error_response::{ApiError, ApiResult};
use super::state::AppState;
use crate::file_store;
use crate::repo_manager;

/// `GET /health` — no auth, no envelope.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `POST /api/data/chunk` — writes one chunk of a session's upload.
pub async fn chunk_handler(
    State(state): State<AppState>,
    Extension(payload): Extension<DecryptedPayload>,
) -> ApiResult<Json<Value>> {
    let session_id = require_string(&payload.metadata, "sessionId")?;
    let chunk_index = require_u64(&payload.metadata, "chunkIndex")? as usize;
    let total_chunks = require_u64(&payload.metadata, "totalChunks")? as usize;

    if payload.binary.is_empty() {
        return Err(ApiError(RelayError::invalid_input("chunk binary payload must not be empty")));
    }

    let received = state
        .sessions
        .store_chunk(&session_id, chunk_index, total_chunks, &payload.binary)
        .await?;

    Ok(Json(json!({ "success": true, "received": received })))
}

/// `POST /api/data/complete` — marks a session's chunk upload complete.
/// Does not itself verify every chunk is present; `reassemble` does.
pub async fn complete_handler(
    State(state): State<AppState>,
    Extension(payload): Extension<DecryptedPayload>,
) -> ApiResult<StatusCode> {
    let session_id = require_string(&payload.metadata, "sessionId")?;
    state.sessions.mark_complete(&session_id)?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /api/gr/process` — finalizes a session onto a Git repository.
///
/// Schedules a background task, holding the per-repo lock, that
/// reassembles the session's chunks into a bundle, fetches/checks out the
/// target repo, imports and pushes the bundle, and records the resulting
/// commit. Any failure along that path transitions the session to
/// `failed` instead of surfacing to the caller.
pub async fn process_handler(
    State(state): State<AppState>,
    Extension(payload): Extension<DecryptedPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session_id = require_string(&payload.metadata, "sessionId")?;
    let repo_spec = require_string(&payload.metadata, "repo")?;
    let branch = require_string(&payload.metadata, "branch")?;
    let base_branch = require_string(&payload.metadata, "baseBranch")?;

    let (owner, repo) = repo_manager::parse_repo_spec(&repo_spec)?;

    if !state.sessions.start_processing(&session_id, Some("processing"))? {
        return Ok((StatusCode::ACCEPTED, Json(json!({ "status": "processing" }))));
    }

    let sessions = state.sessions.clone();
    let repos = state.repos.clone();

    tokio::spawn(async move {
        let outcome = finalize_to_git(&sessions, &repos, &session_id, &owner, &repo, &branch, &base_branch).await;
        if let Err(err) = outcome {
            warn!(session_id, error = %err.message, "gr/process finalize failed");
            sessions.set_failed(&session_id, &err.message).await;
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "processing" }))))
}

async fn finalize_to_git(
    sessions: &crate::session_store::SessionStore,
    repos: &crate::repo_manager::RepoManager,
    session_id: &str,
    owner: &str,
    repo: &str,
    branch: &str,
    base_branch: &str,
) -> Result<(), RelayError> {
    let _guard = repos.acquire(owner, repo).await;

    let bundle_bytes = sessions.reassemble(session_id).await?;
    let working_dir = repos.get_repo(owner, repo, branch, base_branch).await?;
    let sha = repos.apply_bundle(&working_dir, &bundle_bytes, branch, session_id).await?;

    let commit_url = format!("https://github.com/{owner}/{repo}/commit/{sha}");
    info!(session_id, %sha, "pushed bundle to remote");

    sessions.set_status(
        session_id,
        SessionStatus::Pushed,
        "pushed to remote",
        Some(as_map(json!({ "commitSha": sha, "commitUrl": commit_url }))),
    )
}

/// `POST /api/file/store` — finalizes a session as a durable stored file.
pub async fn file_store_handler(
    State(state): State<AppState>,
    Extension(payload): Extension<DecryptedPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session_id = require_string(&payload.metadata, "sessionId")?;
    let file_name = require_string(&payload.metadata, "fileName")?;
    let size = require_u64(&payload.metadata, "size")?;
    let sha256 = require_string(&payload.metadata, "sha256")?;

    if size == 0 || size > state.config.max_file_size_bytes {
        return Err(ApiError(RelayError::invalid_input(
            "size must be a positive number within the configured maximum",
        )));
    }
    if !is_hex64(&sha256) {
        return Err(ApiError(RelayError::invalid_input("sha256 must be a 64-character hex string")));
    }

    if !state.sessions.start_processing(&session_id, Some("processing"))? {
        return Ok((StatusCode::ACCEPTED, Json(json!({ "status": "processing" }))));
    }

    let sessions = state.sessions.clone();
    let storage_root = state.config.file_storage_dir.clone();
    let max_file_size_bytes = state.config.max_file_size_bytes;

    tokio::spawn(async move {
        let outcome = file_store::store_file(
            &sessions,
            &storage_root,
            max_file_size_bytes,
            &session_id,
            &file_name,
            size,
            &sha256,
        )
        .await;

        match outcome {
            Ok(stored) => {
                info!(session_id, path = %stored.stored_path, "stored file");
                let _ = sessions.set_status(
                    &session_id,
                    SessionStatus::Stored,
                    "stored",
                    Some(as_map(json!({
                        "storedPath": stored.stored_path,
                        "storedSize": stored.stored_size,
                    }))),
                );
            }
            Err(err) => {
                warn!(session_id, error = %err.message, "file/store finalize failed");
                sessions.set_failed(&session_id, &err.message).await;
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "processing" }))))
}

#[derive(Debug, Deserialize)]
pub struct RemoteInfoQuery {
    pub repo: String,
    pub branch: String,
}

/// `GET /api/gr/remote-info?repo=owner/repo&branch=...`
pub async fn remote_info_handler(
    State(state): State<AppState>,
    Query(query): Query<RemoteInfoQuery>,
) -> ApiResult<Json<Value>> {
    let (owner, repo) = repo_manager::parse_repo_spec(&query.repo)?;
    let sha = state.repos.remote_info(&owner, &repo, &query.branch).await?;
    Ok(Json(json!({ "sha": sha.unwrap_or_default() })))
}

/// `GET /api/data/status/:sessionId`
pub async fn status_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.sessions.get_session(&session_id)?;
    Ok(Json(snapshot))
}

fn require_string(meta: &Map<String, Value>, key: &str) -> Result<String, RelayError> {
    meta.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RelayError::invalid_input(format!("missing or invalid '{key}'")))
}

fn require_u64(meta: &Map<String, Value>, key: &str) -> Result<u64, RelayError> {
    meta.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| RelayError::invalid_input(format!("missing or invalid integer '{key}'")))
}

fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
