//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! # Relay Core
//!
//! The transport-encryption envelope, the error taxonomy, the `Secret<T>`
//! zeroizing wrapper, and the `git` subprocess collaborator for the git
//! relay service. No session-store or HTTP logic lives here — see
//! `relay-platform` for that.
//!
//! ## Architecture
//!
//! - [`transport`] — v1 (AES-256-GCM) and v2 (X25519 ECDH + HKDF-SHA256 +
//!   AES-256-GCM) envelope decryption, plaintext frame parsing, replay
//!   validation.
//! - [`error`] — [`RelayError`], the single tagged-error sum type.
//! - [`secret`] — [`Secret<T>`], zeroizing wrapper for API keys and PATs.
//! - [`git_ops`] — the `git` binary as an external collaborator: bundle
//!   verify/fetch/push, `git am`, `ls-remote`.
//! - [`hash`] — SHA-256 helpers for the file store's integrity check.

pub mod error;
pub mod git_ops;
pub mod hash;
pub mod secret;
pub mod transport;

pub use error::RelayError;
pub use secret::Secret;
pub use transport::{CryptoMode, TransportCrypto};
