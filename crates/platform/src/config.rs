//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Typed environment configuration for the relay service.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use relay_core::error::RelayError;
use relay_core::secret::Secret;
use relay_core::transport::{self, CryptoMode, ReplayPolicy, ServerKey};

fn env_var(key: &str) -> Result<String, RelayError> {
    env::var(key).map_err(|_| RelayError::invalid_input(format!("missing required environment variable {key}")))
}

fn env_var_opt(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_var_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Runtime configuration for the relay service.
pub struct Config {
    pub api_key: Secret<String>,
    pub github_pat: Secret<String>,
    pub git_author_name: String,
    pub git_author_email: String,
    pub git_committer_name: String,
    pub git_committer_email: String,

    pub port: u16,
    pub repos_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub file_storage_dir: PathBuf,

    pub session_ttl_ms: i64,
    pub cleanup_interval_ms: i64,
    pub max_file_size_bytes: u64,
    pub max_request_body_bytes: usize,
    pub git_op_timeout: Duration,

    pub transport_mode: CryptoMode,
    pub replay_policy: ReplayPolicy,
    pub v1_key: Option<Secret<[u8; 32]>>,
    pub v2_key: Option<ServerKey>,
}

impl Config {
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();

        let api_key = Secret::new(env_var("API_KEY")?);
        let github_pat = Secret::new(env_var("GITHUB_PAT")?);
        let git_author_name = env_var("GIT_AUTHOR_NAME")?;
        let git_author_email = env_var("GIT_AUTHOR_EMAIL")?;
        let git_committer_name = env_var_opt("GIT_COMMITTER_NAME", &git_author_name);
        let git_committer_email = env_var_opt("GIT_COMMITTER_EMAIL", &git_author_email);

        let port = env_var_opt("PORT", "3000")
            .parse()
            .map_err(|_| RelayError::invalid_input("PORT must be a valid u16"))?;
        let repos_dir = PathBuf::from(env_var_opt("REPOS_DIR", "/data/repos"));
        let sessions_dir = PathBuf::from(env_var_opt("SESSIONS_DIR", "/tmp/relay-sessions"));
        let file_storage_dir = PathBuf::from(env_var_opt("FILE_STORAGE_DIR", "/data/storage"));

        let session_ttl_ms = env_var_i64("SESSION_TTL_MS", 600_000);
        let cleanup_interval_ms = env_var_i64("CLEANUP_INTERVAL_MS", 60_000);
        let max_file_size_bytes = env_var_i64("MAX_FILE_SIZE_BYTES", 1024 * 1024 * 1024) as u64;
        let max_request_body_bytes = env_var_i64("MAX_REQUEST_BODY_BYTES", 64 * 1024 * 1024) as usize;
        let git_op_timeout = Duration::from_millis(env_var_i64("GIT_OP_TIMEOUT_MS", 120_000) as u64);

        let transport_mode = CryptoMode::parse(&env_var_opt("TRANSPORT_CRYPTO_MODE", "compat"))?;
        let replay_policy = ReplayPolicy {
            ttl_ms: env_var_i64("TRANSPORT_REPLAY_TTL_MS", transport::replay::DEFAULT_TTL_MS),
            clock_skew_ms: env_var_i64("TRANSPORT_CLOCK_SKEW_MS", transport::replay::DEFAULT_CLOCK_SKEW_MS),
        };

        let v1_key = if transport_mode != CryptoMode::V2Only {
            Some(load_v1_key()?)
        } else {
            None
        };

        let v2_key = if transport_mode != CryptoMode::V1Only {
            Some(load_v2_key()?)
        } else {
            None
        };

        Ok(Self {
            api_key,
            github_pat,
            git_author_name,
            git_author_email,
            git_committer_name,
            git_committer_email,
            port,
            repos_dir,
            sessions_dir,
            file_storage_dir,
            session_ttl_ms,
            cleanup_interval_ms,
            max_file_size_bytes,
            max_request_body_bytes,
            git_op_timeout,
            transport_mode,
            replay_policy,
            v1_key,
            v2_key,
        })
    }
}

fn load_v1_key() -> Result<Secret<[u8; 32]>, RelayError> {
    let raw = env_var("ENCRYPTION_KEY")?;
    let decoded = BASE64
        .decode(raw.trim())
        .map_err(|e| RelayError::invalid_input(format!("ENCRYPTION_KEY is not valid base64: {e}")))?;
    let key: [u8; 32] = decoded
        .try_into()
        .map_err(|_| RelayError::invalid_input("ENCRYPTION_KEY must decode to exactly 32 bytes"))?;
    Ok(Secret::new(key))
}

fn load_v2_key() -> Result<ServerKey, RelayError> {
    let key_id = env_var("TRANSPORT_KEY_ID")?;
    if key_id.len() > 255 {
        return Err(RelayError::invalid_input("TRANSPORT_KEY_ID must be at most 255 bytes"));
    }

    let raw_pem = env_var("TRANSPORT_PRIVATE_KEY_PEM")?;
    let pem_text = raw_pem.replace("\\n", "\n");
    let private = transport::parse_private_key_pem(&pem_text)?;

    Ok(ServerKey::new(key_id, private))
}
