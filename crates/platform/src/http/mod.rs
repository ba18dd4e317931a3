//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! HTTP layer — Axum-based REST surface for the git relay service.
//!
//! - [`auth`] — `x-server-key` authentication middleware.
//! - [`envelope`] — transport-envelope decryption middleware.
//! - [`error_response`] — maps [`relay_core::error::RelayError`] onto the
//!   wire error shape.
//! - [`handlers`] — the chunk/complete/process/store/status/remote-info
//!   route handlers.
//! - [`router`] — route composition and middleware ordering.
//! - [`state`] — [`AppState`], the shared service handles.

pub mod auth;
pub mod envelope;
pub mod error_response;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
