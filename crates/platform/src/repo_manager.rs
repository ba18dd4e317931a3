//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Per-repository serialization and lifecycle manager.
//!
//! Git work against the same `"owner/repo"` is serialized through a FIFO
//! `tokio::sync::Mutex` keyed by that string; distinct repos proceed in
//! parallel. The lock is acquired as an owned guard so a background task
//! can hold it across awaits and release it on every exit path, including
//! panics, via `Drop`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

use relay_core::error::RelayError;
use relay_core::git_ops::{self, GitIdentity};
use relay_core::secret::Secret;

pub struct RepoManager {
    repos_root: PathBuf,
    github_pat: Secret<String>,
    identity: GitIdentity,
    git_op_timeout: Duration,
    locks: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl RepoManager {
    pub fn new(
        repos_root: PathBuf,
        github_pat: Secret<String>,
        identity: GitIdentity,
        git_op_timeout: Duration,
    ) -> Self {
        Self {
            repos_root,
            github_pat,
            identity,
            git_op_timeout,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<TokioMutex<()>> {
        let mut locks = self.locks.lock().expect("repo lock map mutex poisoned");
        locks.entry(key.to_string()).or_insert_with(|| Arc::new(TokioMutex::new(()))).clone()
    }

    /// Acquires the FIFO lock for `"owner/repo"`. The returned guard
    /// serializes all git work against this key until dropped.
    pub async fn acquire(&self, owner: &str, repo: &str) -> OwnedMutexGuard<()> {
        let key = format!("{owner}/{repo}");
        self.lock_for(&key).lock_owned().await
    }

    /// Clone-or-fetch then `checkout -B branch origin/baseBranch`. Must be
    /// called while holding the key's lock.
    pub async fn get_repo(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        base_branch: &str,
    ) -> Result<PathBuf, RelayError> {
        let dest = self.repos_root.join(owner).join(repo);
        let remote_url = git_ops::authenticated_remote_url(owner, repo, &self.github_pat);
        git_ops::clone_or_fetch(&remote_url, &dest, self.git_op_timeout).await?;
        git_ops::checkout_from_base(&dest, branch, base_branch, self.git_op_timeout).await?;
        Ok(dest)
    }

    /// Imports and pushes a bundle's commits onto `branch`, returning the
    /// resulting commit SHA.
    pub async fn apply_bundle(
        &self,
        working_dir: &Path,
        bundle_bytes: &[u8],
        branch: &str,
        session_id: &str,
    ) -> Result<String, RelayError> {
        git_ops::apply_bundle(working_dir, bundle_bytes, branch, session_id, self.git_op_timeout).await
    }

    /// Applies an mbox-format patch to the working tree, commits via `git
    /// am`, and pushes — returning the resulting commit SHA. Available as
    /// an alternate finalize path; no route in this service dispatches to
    /// it directly today.
    pub async fn apply_patch_and_push(
        &self,
        working_dir: &Path,
        mbox_bytes: &[u8],
        branch: &str,
    ) -> Result<String, RelayError> {
        git_ops::apply_patch(working_dir, mbox_bytes, &self.identity, self.git_op_timeout).await?;
        git_ops::push_branch(working_dir, branch, self.git_op_timeout).await
    }

    /// The remote's current tip for `branch`, without touching any local
    /// working copy.
    pub async fn remote_info(&self, owner: &str, repo: &str, branch: &str) -> Result<Option<String>, RelayError> {
        let remote_url = git_ops::authenticated_remote_url(owner, repo, &self.github_pat);
        git_ops::get_remote_info(&remote_url, branch, self.git_op_timeout).await
    }
}

/// Parses `"owner/repo"` into its two components.
pub fn parse_repo_spec(spec: &str) -> Result<(String, String), RelayError> {
    let mut parts = spec.splitn(2, '/');
    let owner = parts.next().filter(|s| !s.is_empty());
    let repo = parts.next().filter(|s| !s.is_empty());
    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok((owner.to_string(), repo.to_string())),
        _ => Err(RelayError::invalid_input(format!("malformed repo spec: {spec}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_repo() {
        let (owner, repo) = parse_repo_spec("acme/widgets").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "widgets");
    }

    #[test]
    fn rejects_spec_without_slash() {
        assert!(parse_repo_spec("acme").is_err());
    }

    #[test]
    fn rejects_empty_components() {
        assert!(parse_repo_spec("/widgets").is_err());
        assert!(parse_repo_spec("acme/").is_err());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block_each_other() {
        let manager = RepoManager::new(
            PathBuf::from("/tmp/does-not-matter"),
            Secret::new("pat".to_string()),
            GitIdentity {
                author_name: "relay".to_string(),
                author_email: "relay@example.com".to_string(),
                committer_name: "relay".to_string(),
                committer_email: "relay@example.com".to_string(),
            },
            Duration::from_secs(5),
        );

        let guard_a = manager.acquire("a", "b").await;
        let guard_c = manager.acquire("c", "d").await;
        drop(guard_a);
        drop(guard_c);
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let manager = Arc::new(RepoManager::new(
            PathBuf::from("/tmp/does-not-matter"),
            Secret::new("pat".to_string()),
            GitIdentity {
                author_name: "relay".to_string(),
                author_email: "relay@example.com".to_string(),
                committer_name: "relay".to_string(),
                committer_email: "relay@example.com".to_string(),
            },
            Duration::from_secs(5),
        ));

        let order = Arc::new(StdMutex::new(Vec::new()));

        let m1 = manager.clone();
        let o1 = order.clone();
        let first = tokio::spawn(async move {
            let _guard = m1.acquire("a", "b").await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            o1.lock().unwrap().push(1);
        });

        tokio::time::sleep(Duration::from_millis(5)).await;

        let m2 = manager.clone();
        let o2 = order.clone();
        let second = tokio::spawn(async move {
            let _guard = m2.acquire("a", "b").await;
            o2.lock().unwrap().push(2);
        });

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }
}
