//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Reassemble → size check → SHA-256 check → dated path write.

use std::path::{Path, PathBuf};

use chrono::Utc;

use relay_core::error::RelayError;
use relay_core::hash;

use crate::session_store::SessionStore;

pub struct StoredFile {
    pub stored_path: String,
    pub stored_size: u64,
}

/// Keeps only the basename, maps filesystem-hostile characters to `_`,
/// collapses runs of `_`, strips leading/trailing `_`/`.`, and substitutes
/// `unnamed` if the result is empty.
pub fn sanitize_filename(raw: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let mapped: String = basename
        .chars()
        .map(|c| {
            if matches!(c, '\x00'..='\x1f' | '\x7f' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(mapped.len());
    let mut last_was_underscore = false;
    for c in mapped.chars() {
        if c == '_' {
            if !last_was_underscore {
                collapsed.push(c);
            }
            last_was_underscore = true;
        } else {
            collapsed.push(c);
            last_was_underscore = false;
        }
    }

    let trimmed = collapsed.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

fn validate_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

pub async fn store_file(
    sessions: &SessionStore,
    storage_root: &Path,
    max_file_size_bytes: u64,
    session_id: &str,
    file_name: &str,
    expected_size: u64,
    expected_sha256_hex: &str,
) -> Result<StoredFile, RelayError> {
    if !validate_sha256_hex(expected_sha256_hex) {
        return Err(RelayError::invalid_input("sha256 must be a 64-character hex string"));
    }

    let data = sessions.reassemble(session_id).await?;

    if data.len() as u64 != expected_size {
        return Err(RelayError::size_mismatch(expected_size, data.len() as u64));
    }
    if data.len() as u64 > max_file_size_bytes {
        return Err(RelayError::file_too_large(data.len() as u64, max_file_size_bytes));
    }

    let actual_digest = hash::sha256_hex(&data);
    if !hash::digests_match(expected_sha256_hex, &actual_digest) {
        return Err(RelayError::sha256_mismatch());
    }

    let now = Utc::now();
    let dated_dir = storage_root
        .join(format!("{:04}", now.format("%Y")))
        .join(format!("{:02}", now.format("%m")))
        .join(format!("{:02}", now.format("%d")));

    let sanitized = sanitize_filename(file_name);
    let dest = dated_dir.join(format!("{session_id}-{sanitized}"));

    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        return Err(RelayError::file_exists(dest.display()));
    }

    tokio::fs::create_dir_all(&dated_dir)
        .await
        .map_err(|e| RelayError::internal(format!("failed to create {}: {e}", dated_dir.display())))?;

    write_atomic(&dest, &data).await?;

    Ok(StoredFile {
        stored_path: dest.to_string_lossy().into_owned(),
        stored_size: data.len() as u64,
    })
}

async fn write_atomic(dest: &Path, data: &[u8]) -> Result<(), RelayError> {
    let tmp_path: PathBuf = dest.with_extension("tmp-upload");
    tokio::fs::write(&tmp_path, data)
        .await
        .map_err(|e| RelayError::internal(format!("failed to write temp file: {e}")))?;
    tokio::fs::rename(&tmp_path, dest)
        .await
        .map_err(|e| RelayError::internal(format!("failed to rename into place: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_basename_only() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("some/dir/report.pdf"), "report.pdf");
    }

    #[test]
    fn collapses_and_trims_underscores() {
        assert_eq!(sanitize_filename("a***b???c"), "a_b_c");
        assert_eq!(sanitize_filename("___leading"), "leading");
        assert_eq!(sanitize_filename("trailing___"), "trailing");
    }

    #[test]
    fn empty_result_becomes_unnamed() {
        assert_eq!(sanitize_filename("..."), "unnamed");
        assert_eq!(sanitize_filename("///"), "unnamed");
    }

    #[tokio::test]
    async fn happy_path_writes_dated_file() {
        let sessions_dir = tempfile::tempdir().unwrap();
        let storage_dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(sessions_dir.path().to_path_buf());

        let content = b"hello world";
        sessions.store_chunk("s1", 0, 1, content).await.unwrap();

        let expected_sha = hash::sha256_hex(content);
        let result = store_file(
            &sessions,
            storage_dir.path(),
            1024,
            "s1",
            "report.txt",
            content.len() as u64,
            &expected_sha,
        )
        .await
        .unwrap();

        assert_eq!(result.stored_size, content.len() as u64);
        assert!(result.stored_path.contains("s1-report.txt"));
        let written = tokio::fs::read(&result.stored_path).await.unwrap();
        assert_eq!(written, content);
    }

    #[tokio::test]
    async fn size_mismatch_is_rejected() {
        let sessions_dir = tempfile::tempdir().unwrap();
        let storage_dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(sessions_dir.path().to_path_buf());
        sessions.store_chunk("s1", 0, 1, b"hello").await.unwrap();

        let err = store_file(&sessions, storage_dir.path(), 1024, "s1", "f.txt", 999, &"a".repeat(64))
            .await
            .unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::SizeMismatch);
    }

    #[tokio::test]
    async fn digest_mismatch_is_rejected() {
        let sessions_dir = tempfile::tempdir().unwrap();
        let storage_dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(sessions_dir.path().to_path_buf());
        let content = b"hello world";
        sessions.store_chunk("s1", 0, 1, content).await.unwrap();

        let err = store_file(
            &sessions,
            storage_dir.path(),
            1024,
            "s1",
            "f.txt",
            content.len() as u64,
            &"0".repeat(64),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::Sha256Mismatch);
    }
}
