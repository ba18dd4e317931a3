//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Replay validation over decrypted v2 metadata: timestamp freshness plus
//! a bounded in-memory nonce cache. Ephemeral by design — the session
//! store's own TTL model already accepts losing this state across
//! restarts, per the relay's non-goals.

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::RelayError;

pub const DEFAULT_TTL_MS: i64 = 300_000;
pub const DEFAULT_CLOCK_SKEW_MS: i64 = 30_000;

#[derive(Debug, Clone, Copy)]
pub struct ReplayPolicy {
    pub ttl_ms: i64,
    pub clock_skew_ms: i64,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            clock_skew_ms: DEFAULT_CLOCK_SKEW_MS,
        }
    }
}

/// First-seen-wins nonce cache. Entries are swept lazily whenever a
/// validation call observes one older than the TTL window.
#[derive(Debug, Default)]
pub struct ReplayCache {
    seen: Mutex<HashSet<(String, i64)>>,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop cache entries whose timestamp has fallen outside the TTL
    /// window relative to `now_ms`. Called opportunistically from
    /// [`validate`] and exposed standalone for a periodic sweep task.
    pub fn sweep(&self, now_ms: i64, ttl_ms: i64) {
        let mut seen = self.seen.lock().expect("replay cache mutex poisoned");
        seen.retain(|(_, ts)| *ts >= now_ms - ttl_ms);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// Validates and strips `timestamp`/`nonce` from decrypted v2 metadata.
///
/// On success, returns the metadata with both fields removed. Every
/// failure is surfaced as `DECRYPTION_FAILED`, per the spec's envelope
/// error taxonomy — replay metadata is treated as part of envelope
/// framing, not a distinct validation layer.
pub fn validate(
    mut metadata: Map<String, Value>,
    cache: &ReplayCache,
    policy: ReplayPolicy,
    now_ms: i64,
) -> Result<Map<String, Value>, RelayError> {
    let timestamp = metadata
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or_else(|| RelayError::decryption_failed("missing or non-integer timestamp"))?;

    if timestamp < now_ms - policy.ttl_ms {
        return Err(RelayError::decryption_failed("timestamp expired"));
    }
    if timestamp > now_ms + policy.clock_skew_ms {
        return Err(RelayError::decryption_failed("timestamp too far in the future"));
    }

    let nonce = metadata
        .get("nonce")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::decryption_failed("missing nonce"))?;
    if !(8..=256).contains(&nonce.len()) {
        return Err(RelayError::decryption_failed("nonce length out of range"));
    }
    let nonce = nonce.to_string();

    {
        let mut seen = cache.seen.lock().expect("replay cache mutex poisoned");
        seen.retain(|(_, ts)| *ts >= now_ms - policy.ttl_ms);
        if !seen.insert((nonce, timestamp)) {
            return Err(RelayError::decryption_failed("replayed nonce"));
        }
    }

    metadata.remove("timestamp");
    metadata.remove("nonce");
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(nonce: &str, timestamp: i64) -> Map<String, Value> {
        match json!({ "nonce": nonce, "timestamp": timestamp, "sessionId": "s1" }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn accepts_fresh_request_and_strips_fields() {
        let cache = ReplayCache::new();
        let out = validate(meta("nonce-0001", 1_000_000), &cache, ReplayPolicy::default(), 1_000_000).unwrap();
        assert!(!out.contains_key("nonce"));
        assert!(!out.contains_key("timestamp"));
        assert_eq!(out["sessionId"], "s1");
    }

    #[test]
    fn rejects_second_identical_nonce() {
        let cache = ReplayCache::new();
        let policy = ReplayPolicy::default();
        validate(meta("nonce-0001", 1_000_000), &cache, policy, 1_000_000).unwrap();
        let err = validate(meta("nonce-0001", 1_000_000), &cache, policy, 1_000_050).unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::DecryptionFailed);
    }

    #[test]
    fn rejects_expired_timestamp() {
        let cache = ReplayCache::new();
        let policy = ReplayPolicy::default();
        let err = validate(meta("nonce-0001", 0), &cache, policy, 1_000_000).unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::DecryptionFailed);
    }

    #[test]
    fn rejects_future_timestamp_beyond_skew() {
        let cache = ReplayCache::new();
        let policy = ReplayPolicy::default();
        let err = validate(meta("nonce-0001", 2_000_000), &cache, policy, 1_000_000).unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::DecryptionFailed);
    }

    #[test]
    fn rejects_short_nonce() {
        let cache = ReplayCache::new();
        let err = validate(meta("abc", 1_000_000), &cache, ReplayPolicy::default(), 1_000_000).unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::DecryptionFailed);
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let cache = ReplayCache::new();
        let policy = ReplayPolicy { ttl_ms: 1000, ..Default::default() };
        validate(meta("nonce-0001", 1_000_000), &cache, policy, 1_000_000).unwrap();
        assert_eq!(cache.len(), 1);
        cache.sweep(1_005_000, 1000);
        assert_eq!(cache.len(), 0);
    }
}
