//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Session status vocabulary and the status-polling response shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The session state machine described in the spec's `§4.2` diagram.
///
/// ```text
///            storeChunk                       markComplete
///   ∅ ───────────────────▶ receiving ───────────────────▶ complete
///                             │                              │
///                             │   startProcessing            │  startProcessing
///                             ▼                              ▼
///                        processing ◀──────────────────── processing
///                             │                              │
///         success ┌───────────┼─────────────┐ success
///                 ▼           ▼             ▼
///              pushed        stored       failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Receiving,
    Complete,
    Processing,
    Pushed,
    Stored,
    Failed,
}

impl SessionStatus {
    /// Whether a chunk write is still permitted against a session in this status.
    pub fn accepts_chunks(self) -> bool {
        matches!(self, SessionStatus::Receiving | SessionStatus::Complete)
    }

    /// Whether `startProcessing` may transition out of this status.
    pub fn is_processable(self) -> bool {
        matches!(self, SessionStatus::Receiving | SessionStatus::Complete)
    }
}

/// Open, append-only map of outcome metadata (`commitSha`, `commitUrl`,
/// `storedPath`, `storedSize`, `error`, ...). Kept as a JSON object rather
/// than a fixed struct since the spec defines it as an "open map".
pub type SessionDetails = Map<String, Value>;

/// The response shape for `GET /data/status/:sessionId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub message: String,
    pub details: SessionDetails,
    pub created_at: i64,
    pub updated_at: i64,
}
