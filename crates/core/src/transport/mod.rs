//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! The transport-encryption envelope: v1 (static AES-256-GCM) and v2
//! (X25519 ECDH + HKDF-SHA256 + AES-256-GCM), detected by magic bytes,
//! gated by [`CryptoMode`], followed by plaintext [`frame::Frame`]
//! parsing and [`replay`] validation.

pub mod frame;
pub mod replay;
mod spki;
mod v1;
mod v2;

use x25519_dalek::StaticSecret;

use crate::error::RelayError;
use crate::secret::Secret;

pub use frame::Frame;
pub use replay::{ReplayCache, ReplayPolicy};
pub use v2::{ServerKey, MAGIC as V2_MAGIC};

/// Which envelope versions the server will accept, per `TRANSPORT_CRYPTO_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoMode {
    V1Only,
    Compat,
    V2Only,
}

impl CryptoMode {
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        match raw {
            "v1" => Ok(CryptoMode::V1Only),
            "compat" => Ok(CryptoMode::Compat),
            "v2" => Ok(CryptoMode::V2Only),
            other => Err(RelayError::invalid_input(format!(
                "invalid TRANSPORT_CRYPTO_MODE: {other}"
            ))),
        }
    }

    fn accepts_v1(self) -> bool {
        matches!(self, CryptoMode::V1Only | CryptoMode::Compat)
    }

    fn accepts_v2(self) -> bool {
        matches!(self, CryptoMode::V2Only | CryptoMode::Compat)
    }
}

/// Holds the keys and mode needed to decrypt incoming envelopes.
pub struct TransportCrypto {
    mode: CryptoMode,
    v1_key: Option<Secret<[u8; 32]>>,
    v2_key: Option<ServerKey>,
}

impl TransportCrypto {
    pub fn new(mode: CryptoMode, v1_key: Option<Secret<[u8; 32]>>, v2_key: Option<ServerKey>) -> Self {
        Self {
            mode,
            v1_key,
            v2_key,
        }
    }

    pub fn mode(&self) -> CryptoMode {
        self.mode
    }

    /// Detects the envelope version by its leading magic bytes, enforces
    /// `self.mode`'s gating, and decrypts to the plaintext frame bytes.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, RelayError> {
        let is_v2 = envelope.len() >= 4 && &envelope[0..4] == v2::MAGIC;

        if is_v2 {
            if !self.mode.accepts_v2() {
                return Err(RelayError::decryption_failed("v2 envelopes are not accepted in this mode"));
            }
            let key = self
                .v2_key
                .as_ref()
                .ok_or_else(|| RelayError::internal("v2 key not configured"))?;
            v2::decrypt(key, envelope)
        } else {
            if !self.mode.accepts_v1() {
                return Err(RelayError::decryption_failed("v1 envelopes are not accepted in this mode"));
            }
            let key = self
                .v1_key
                .as_ref()
                .ok_or_else(|| RelayError::internal("v1 key not configured"))?;
            v1::decrypt(key, envelope)
        }
    }
}

/// Decodes the PEM-armored v2 static private key. The PEM body is
/// expected to hold either the raw 32-byte X25519 scalar, or a
/// PKCS8-wrapped encoding of it (RFC 5958) — in the latter case the
/// scalar is always the trailing 32 bytes of the DER.
pub fn parse_private_key_pem(pem_text: &str) -> Result<StaticSecret, RelayError> {
    let parsed = pem::parse(pem_text)
        .map_err(|e| RelayError::invalid_input(format!("invalid TRANSPORT_PRIVATE_KEY_PEM: {e}")))?;

    let der = parsed.contents();
    if der.len() < 32 {
        return Err(RelayError::invalid_input(
            "TRANSPORT_PRIVATE_KEY_PEM contents shorter than a 32-byte X25519 scalar",
        ));
    }

    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&der[der.len() - 32..]);
    Ok(StaticSecret::from(scalar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn mode_parses_known_values() {
        assert_eq!(CryptoMode::parse("v1").unwrap(), CryptoMode::V1Only);
        assert_eq!(CryptoMode::parse("compat").unwrap(), CryptoMode::Compat);
        assert_eq!(CryptoMode::parse("v2").unwrap(), CryptoMode::V2Only);
        assert!(CryptoMode::parse("bogus").is_err());
    }

    #[test]
    fn raw_pem_scalar_round_trips() {
        let secret = StaticSecret::random_from_rng(OsRng);
        let pem_text = pem::encode(&pem::Pem::new("X25519 PRIVATE KEY", secret.to_bytes().to_vec()));
        let parsed = parse_private_key_pem(&pem_text).unwrap();
        assert_eq!(parsed.to_bytes(), secret.to_bytes());
    }

    #[test]
    fn v1_only_mode_rejects_v2_envelope() {
        let crypto = TransportCrypto::new(CryptoMode::V1Only, Some(Secret::new([1u8; 32])), None);
        let mut envelope = v2::MAGIC.to_vec();
        envelope.extend_from_slice(&[0u8; 40]);
        let err = crypto.decrypt(&envelope).unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::DecryptionFailed);
    }

    #[test]
    fn v2_only_mode_rejects_v1_envelope() {
        let crypto = TransportCrypto::new(
            CryptoMode::V2Only,
            None,
            Some(ServerKey::new("k1".to_string(), StaticSecret::random_from_rng(OsRng))),
        );
        let envelope = vec![0u8; 40];
        let err = crypto.decrypt(&envelope).unwrap_err();
        assert_eq!(err.code, relay_types::ErrorCode::DecryptionFailed);
    }
}
