//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Machine-readable error codes, per the taxonomy in spec `§7`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    Unauthorized,
    SessionNotFound,
    SessionCompleted,
    IncompleteChunks,
    DecryptionFailed,
    GitError,
    SizeMismatch,
    FileTooLarge,
    Sha256Mismatch,
    FileExists,
    InternalError,
}

impl ErrorCode {
    /// The stable `SCREAMING_SNAKE_CASE` machine code sent in the `error` field.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::SessionCompleted => "SESSION_COMPLETED",
            ErrorCode::IncompleteChunks => "INCOMPLETE_CHUNKS",
            ErrorCode::DecryptionFailed => "DECRYPTION_FAILED",
            ErrorCode::GitError => "GIT_ERROR",
            ErrorCode::SizeMismatch => "SIZE_MISMATCH",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::Sha256Mismatch => "SHA256_MISMATCH",
            ErrorCode::FileExists => "FILE_EXISTS",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// The HTTP status code associated with this machine code by the spec.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::SessionNotFound => 404,
            ErrorCode::SessionCompleted => 409,
            ErrorCode::IncompleteChunks => 400,
            ErrorCode::DecryptionFailed => 400,
            ErrorCode::GitError => 500,
            ErrorCode::SizeMismatch => 400,
            ErrorCode::FileTooLarge => 400,
            ErrorCode::Sha256Mismatch => 400,
            ErrorCode::FileExists => 409,
            ErrorCode::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
