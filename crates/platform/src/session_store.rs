//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! The chunked-session pipeline: per-session status state machine, disk-
//! backed chunk persistence, destructive reassembly, and a TTL sweep.
//!
//! The in-memory `sessions` map is guarded by a single `std::sync::Mutex`
//! — critical sections only ever touch the map itself, never perform I/O,
//! so the lock is never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};

use relay_core::error::RelayError;
use relay_types::{SessionSnapshot, SessionStatus};

struct Session {
    total_chunks: usize,
    received_chunks: HashSet<usize>,
    status: SessionStatus,
    message: String,
    details: Map<String, Value>,
    created_at: i64,
    updated_at: i64,
}

impl Session {
    fn new(total_chunks: usize, now_ms: i64) -> Self {
        Self {
            total_chunks,
            received_chunks: HashSet::new(),
            status: SessionStatus::Receiving,
            message: "receiving chunks".to_string(),
            details: Map::new(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    fn snapshot(&self, session_id: &str) -> SessionSnapshot {
        let mut details = self.details.clone();
        details.insert("chunksReceived".to_string(), Value::from(self.received_chunks.len()));
        details.insert("totalChunks".to_string(), Value::from(self.total_chunks));
        SessionSnapshot {
            session_id: session_id.to_string(),
            status: self.status,
            message: self.message.clone(),
            details,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn chunk_path(sessions_root: &std::path::Path, session_id: &str, chunk_index: usize) -> PathBuf {
    sessions_root.join(session_id).join(format!("chunk-{chunk_index}.bin"))
}

fn session_dir(sessions_root: &std::path::Path, session_id: &str) -> PathBuf {
    sessions_root.join(session_id)
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    sessions_root: PathBuf,
}

impl SessionStore {
    pub fn new(sessions_root: PathBuf) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sessions_root,
        }
    }

    /// Writes `bytes` to `chunk-<chunkIndex>.bin`, creating the session
    /// lazily with `status=receiving` on first chunk. Idempotent per
    /// `(sessionId, chunkIndex)`: rewriting an index overwrites the file
    /// without growing `receivedChunks`.
    pub async fn store_chunk(
        &self,
        session_id: &str,
        chunk_index: usize,
        total_chunks: usize,
        bytes: &[u8],
    ) -> Result<usize, RelayError> {
        if total_chunks == 0 {
            return Err(RelayError::invalid_input("totalChunks must be positive"));
        }
        if chunk_index >= total_chunks {
            return Err(RelayError::invalid_input(format!(
                "chunkIndex {chunk_index} out of range for totalChunks {total_chunks}"
            )));
        }

        let received_count = {
            let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
            let session = sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Session::new(total_chunks, now_ms()));

            if !session.status.accepts_chunks() {
                return Err(RelayError::session_completed());
            }
            if session.total_chunks != total_chunks {
                return Err(RelayError::invalid_input(format!(
                    "totalChunks mismatch: session has {}, request has {total_chunks}",
                    session.total_chunks
                )));
            }

            session.received_chunks.insert(chunk_index);
            session.updated_at = now_ms();
            session.received_chunks.len()
        };

        let path = chunk_path(&self.sessions_root, session_id, chunk_index);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RelayError::internal(format!("failed to create session dir: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| RelayError::internal(format!("failed to write chunk: {e}")))?;

        Ok(received_count)
    }

    /// Transitions `receiving → complete`. Does not verify all chunks are
    /// present — `reassemble` does that.
    pub fn mark_complete(&self, session_id: &str) -> Result<(), RelayError> {
        let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RelayError::session_not_found(session_id))?;

        if session.status == SessionStatus::Receiving {
            session.status = SessionStatus::Complete;
            session.message = "all chunks received".to_string();
        }
        session.updated_at = now_ms();
        Ok(())
    }

    /// Atomic compare-and-set: `{receiving, complete} → processing`.
    /// Returns `true` exactly once per session — the single point
    /// preventing duplicate finalization.
    pub fn start_processing(&self, session_id: &str, message: Option<&str>) -> Result<bool, RelayError> {
        let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RelayError::session_not_found(session_id))?;

        if session.status.is_processable() {
            session.status = SessionStatus::Processing;
            session.message = message.unwrap_or("processing").to_string();
            session.updated_at = now_ms();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Requires every chunk `0..totalChunks` to be present. Reads them in
    /// order, concatenates, and destructively removes the on-disk
    /// directory on success. In-memory metadata is retained for polling.
    pub async fn reassemble(&self, session_id: &str) -> Result<Vec<u8>, RelayError> {
        let (total_chunks, received_count) = {
            let sessions = self.sessions.lock().expect("session map mutex poisoned");
            let session = sessions
                .get(session_id)
                .ok_or_else(|| RelayError::session_not_found(session_id))?;
            (session.total_chunks, session.received_chunks.len())
        };

        if received_count != total_chunks {
            return Err(RelayError::incomplete_chunks(total_chunks, received_count));
        }

        let mut buf = Vec::new();
        for i in 0..total_chunks {
            let path = chunk_path(&self.sessions_root, session_id, i);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| RelayError::internal(format!("failed to read chunk {i}: {e}")))?;
            buf.extend_from_slice(&bytes);
        }

        let dir = session_dir(&self.sessions_root, session_id);
        let _ = tokio::fs::remove_dir_all(&dir).await;

        Ok(buf)
    }

    /// Merges `details_patch` into `details`, updates the status/message.
    pub fn set_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: &str,
        details_patch: Option<Map<String, Value>>,
    ) -> Result<(), RelayError> {
        let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RelayError::session_not_found(session_id))?;

        session.status = status;
        session.message = message.to_string();
        if let Some(patch) = details_patch {
            session.details.extend(patch);
        }
        session.updated_at = now_ms();
        Ok(())
    }

    /// Best-effort: missing sessions are silently ignored.
    pub async fn set_failed(&self, session_id: &str, error: &str) {
        {
            let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
            if let Some(session) = sessions.get_mut(session_id) {
                session.status = SessionStatus::Failed;
                session.message = "processing failed".to_string();
                session.details.insert("error".to_string(), Value::String(error.to_string()));
                session.updated_at = now_ms();
            } else {
                return;
            }
        }
        let dir = session_dir(&self.sessions_root, session_id);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    pub fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, RelayError> {
        let sessions = self.sessions.lock().expect("session map mutex poisoned");
        sessions
            .get(session_id)
            .map(|s| s.snapshot(session_id))
            .ok_or_else(|| RelayError::session_not_found(session_id))
    }

    /// Removes sessions whose `updatedAt` age exceeds `ttl_ms`, along with
    /// their on-disk chunk directories.
    pub async fn sweep_expired(&self, ttl_ms: i64) {
        let expired: Vec<String> = {
            let now = now_ms();
            let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
            let expired_ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| now - s.updated_at > ttl_ms)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &expired_ids {
                sessions.remove(id);
            }
            expired_ids
        };

        for id in expired {
            let dir = session_dir(&self.sessions_root, &id);
            let _ = tokio::fs::remove_dir_all(&dir).await;
        }
    }
}

/// Spawns the periodic TTL sweep task (default every 60s). The handle can
/// be dropped to cancel; it never blocks request handlers.
pub fn spawn_ttl_sweeper(store: Arc<SessionStore>, ttl_ms: i64, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            store.sweep_expired(ttl_ms).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (SessionStore::new(dir.path().to_path_buf()), dir)
    }

    #[tokio::test]
    async fn idempotent_chunking_and_reassembly() {
        let (store, _dir) = store();
        store.store_chunk("s1", 1, 3, b"bbb").await.unwrap();
        store.store_chunk("s1", 0, 3, b"aaa").await.unwrap();
        let count = store.store_chunk("s1", 2, 3, b"ccc").await.unwrap();
        assert_eq!(count, 3);

        store.mark_complete("s1").unwrap();
        let bytes = store.reassemble("s1").await.unwrap();
        assert_eq!(bytes, b"aaabbbccc");
    }

    #[tokio::test]
    async fn duplicate_chunk_does_not_grow_received_set() {
        let (store, _dir) = store();
        store.store_chunk("s1", 0, 2, b"first").await.unwrap();
        let count = store.store_chunk("s1", 0, 2, b"second").await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn reassemble_before_all_chunks_fails() {
        let (store, _dir) = store();
        store.store_chunk("s1", 0, 3, b"a").await.unwrap();
        store.store_chunk("s1", 2, 3, b"c").await.unwrap();
        let err = store.reassemble("s1").await.unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::IncompleteChunks);
        assert!(err.message.contains("Expected 3 chunks, received 2"));
    }

    #[tokio::test]
    async fn start_processing_is_at_most_once() {
        let (store, _dir) = store();
        store.store_chunk("s1", 0, 1, b"a").await.unwrap();
        assert!(store.start_processing("s1", None).unwrap());
        assert!(!store.start_processing("s1", None).unwrap());
    }

    #[tokio::test]
    async fn chunk_write_after_terminal_status_is_rejected() {
        let (store, _dir) = store();
        store.store_chunk("s1", 0, 1, b"a").await.unwrap();
        store.start_processing("s1", None).unwrap();
        store
            .set_status("s1", SessionStatus::Pushed, "done", None)
            .unwrap();

        let err = store.store_chunk("s1", 0, 1, b"a").await.unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::SessionCompleted);
    }

    #[tokio::test]
    async fn mark_complete_does_not_check_completeness() {
        let (store, _dir) = store();
        store.store_chunk("s1", 0, 3, b"a").await.unwrap();
        store.mark_complete("s1").unwrap();
        let snapshot = store.get_session("s1").unwrap();
        assert_eq!(snapshot.status, SessionStatus::Complete);
    }

    #[tokio::test]
    async fn set_failed_is_best_effort_on_missing_session() {
        let (store, _dir) = store();
        store.set_failed("ghost", "boom").await;
    }

    #[tokio::test]
    async fn unknown_session_returns_not_found() {
        let (store, _dir) = store();
        let err = store.get_session("ghost").unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::SessionNotFound);
    }

    #[tokio::test]
    async fn sweep_removes_expired_sessions() {
        let (store, _dir) = store();
        store.store_chunk("s1", 0, 1, b"a").await.unwrap();
        store.sweep_expired(-1).await;
        assert!(store.get_session("s1").is_err());
    }
}
