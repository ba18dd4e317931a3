//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! AppState — shared state for the relay's HTTP layer.

use std::sync::Arc;

use relay_core::transport::{ReplayCache, TransportCrypto};

use crate::config::Config;
use crate::repo_manager::RepoManager;
use crate::session_store::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub repos: Arc<RepoManager>,
    pub transport: Arc<TransportCrypto>,
    pub replay_cache: Arc<ReplayCache>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        sessions: Arc<SessionStore>,
        repos: Arc<RepoManager>,
        transport: Arc<TransportCrypto>,
    ) -> Self {
        Self {
            config,
            sessions,
            repos,
            transport,
            replay_cache: Arc::new(ReplayCache::new()),
        }
    }
}
