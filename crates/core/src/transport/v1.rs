//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! v1 envelope: `iv(12) || authTag(16) || ciphertext(n)`, AES-256-GCM
//! under a single static symmetric key configured at startup.

use aead::generic_array::GenericArray;
use aes_gcm::{Aes256Gcm, KeyInit};
use aead::Aead;

use crate::error::RelayError;
use crate::secret::Secret;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub fn decrypt(key: &Secret<[u8; 32]>, envelope: &[u8]) -> Result<Vec<u8>, RelayError> {
    if envelope.len() < IV_LEN + TAG_LEN {
        return Err(RelayError::decryption_failed("v1 envelope shorter than iv+tag"));
    }

    let (iv, rest) = envelope.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.expose_secret()));
    cipher
        .decrypt(GenericArray::from_slice(iv), combined.as_ref())
        .map_err(|_| RelayError::decryption_failed("v1 AEAD verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aead::generic_array::GenericArray as GA;

    fn encrypt(key: &[u8; 32], iv: &[u8; 12], plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes256Gcm::new(GA::from_slice(key));
        let combined = cipher.encrypt(GA::from_slice(iv), plaintext).unwrap();
        let (ciphertext, tag) = combined.split_at(combined.len() - TAG_LEN);
        let mut out = iv.to_vec();
        out.extend_from_slice(tag);
        out.extend_from_slice(ciphertext);
        out
    }

    #[test]
    fn round_trips() {
        let key = Secret::new([9u8; 32]);
        let iv = [1u8; 12];
        let envelope = encrypt(key.expose_secret(), &iv, b"hello v1");
        let plaintext = decrypt(&key, &envelope).unwrap();
        assert_eq!(plaintext, b"hello v1");
    }

    #[test]
    fn rejects_tampered_tag() {
        let key = Secret::new([9u8; 32]);
        let iv = [1u8; 12];
        let mut envelope = encrypt(key.expose_secret(), &iv, b"hello v1");
        envelope[IV_LEN] ^= 0xff;
        assert!(decrypt(&key, &envelope).is_err());
    }

    #[test]
    fn rejects_short_envelope() {
        let key = Secret::new([9u8; 32]);
        assert!(decrypt(&key, &[0u8; 10]).is_err());
    }
}
