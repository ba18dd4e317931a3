//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! The relay's single tagged error type.
//!
//! Every fallible operation in the relay — chunk storage, envelope
//! decryption, git subprocess failures, file-store integrity checks —
//! returns a [`RelayError`] carrying a machine code (per the taxonomy in
//! the spec's error-handling design), the associated HTTP status, a
//! human message, and optional structured extra data (e.g.
//! `{expected, received}` for `INCOMPLETE_CHUNKS`).

use relay_types::ErrorCode;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RelayError {
    pub code: ErrorCode,
    pub message: String,
    pub extra: Option<Value>,
}

impl RelayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn status_code(&self) -> u16 {
        self.code.http_status()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "missing or invalid x-server-key")
    }

    pub fn session_not_found(session_id: &str) -> Self {
        Self::new(
            ErrorCode::SessionNotFound,
            format!("no such session: {session_id}"),
        )
    }

    pub fn session_completed() -> Self {
        Self::new(
            ErrorCode::SessionCompleted,
            "session has already entered a terminal or processing state",
        )
    }

    pub fn incomplete_chunks(expected: usize, received: usize) -> Self {
        Self::new(
            ErrorCode::IncompleteChunks,
            format!("Expected {expected} chunks, received {received}"),
        )
        .with_extra(serde_json::json!({ "expected": expected, "received": received }))
    }

    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecryptionFailed, message)
    }

    pub fn git_error(operation: &str, message: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::GitError,
            format!("git {operation} failed: {message}"),
        )
        .with_extra(serde_json::json!({ "operation": operation }))
    }

    pub fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::new(
            ErrorCode::SizeMismatch,
            format!("expected {expected} bytes, got {actual}"),
        )
    }

    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::new(
            ErrorCode::FileTooLarge,
            format!("file of {size} bytes exceeds the {max} byte limit"),
        )
    }

    pub fn sha256_mismatch() -> Self {
        Self::new(ErrorCode::Sha256Mismatch, "SHA-256 digest does not match")
    }

    pub fn file_exists(path: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::FileExists, format!("destination exists: {path}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}
