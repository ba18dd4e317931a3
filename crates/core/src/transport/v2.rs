//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! v2 envelope: an ephemeral X25519 key per request, ECDH against the
//! server's static key, HKDF-SHA256 key derivation, AES-256-GCM with the
//! header as AAD.
//!
//! ```text
//! magic(4="AWR2") | version(1=2) | kidLen(1) | ephKeyLen(2, BE) |
//! iv(12) | kid(kidLen) | ephPubKey(ephKeyLen, SPKI/DER) |
//! authTag(16) | ciphertext(n)
//! ```

use aead::generic_array::GenericArray;
use aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::RelayError;
use crate::transport::spki;

pub const MAGIC: &[u8; 4] = b"AWR2";
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HKDF_INFO_PREFIX: &[u8] = b"relay-transport-v2";

/// The server's long-lived v2 identity: its static X25519 private key and
/// the `keyId` clients must address it by.
#[derive(Clone)]
pub struct ServerKey {
    pub key_id: String,
    private: StaticSecret,
    public_der: Vec<u8>,
}

impl ServerKey {
    pub fn new(key_id: String, private: StaticSecret) -> Self {
        let public = PublicKey::from(&private);
        let public_der = spki::encode(public.as_bytes());
        Self {
            key_id,
            private,
            public_der,
        }
    }
}

struct Header<'a> {
    kid: &'a str,
    iv: [u8; 12],
    eph_pub_der: &'a [u8],
    header_bytes: &'a [u8],
    tag: &'a [u8],
    ciphertext: &'a [u8],
}

fn parse_header(envelope: &[u8]) -> Result<Header<'_>, RelayError> {
    if envelope.len() < 8 {
        return Err(RelayError::decryption_failed("v2 envelope shorter than fixed header"));
    }
    if &envelope[0..4] != MAGIC {
        return Err(RelayError::decryption_failed("not a v2 envelope"));
    }
    let version = envelope[4];
    if version != 2 {
        return Err(RelayError::decryption_failed(format!("unsupported v2 version {version}")));
    }
    let kid_len = envelope[5] as usize;
    let eph_key_len = u16::from_be_bytes([envelope[6], envelope[7]]) as usize;

    let header_len = 4 + 1 + 1 + 2 + IV_LEN + kid_len + eph_key_len;
    if envelope.len() < header_len + TAG_LEN + 1 {
        return Err(RelayError::decryption_failed("v2 envelope shorter than headerLen + tag + 1"));
    }

    let iv_start = 8;
    let kid_start = iv_start + IV_LEN;
    let eph_start = kid_start + kid_len;

    let iv: [u8; 12] = envelope[iv_start..kid_start].try_into().unwrap();
    let kid = std::str::from_utf8(&envelope[kid_start..eph_start])
        .map_err(|_| RelayError::decryption_failed("kid is not valid UTF-8"))?;
    let eph_pub_der = &envelope[eph_start..header_len];

    let tag = &envelope[header_len..header_len + TAG_LEN];
    let ciphertext = &envelope[header_len + TAG_LEN..];

    Ok(Header {
        kid,
        iv,
        eph_pub_der,
        header_bytes: &envelope[..header_len],
        tag,
        ciphertext,
    })
}

fn derive_content_key(
    server: &ServerKey,
    eph_pub_der: &[u8],
    iv: &[u8; 12],
    kid: &str,
) -> Result<[u8; 32], RelayError> {
    let eph_pub_bytes = spki::decode(eph_pub_der)?;
    let eph_pub = PublicKey::from(eph_pub_bytes);

    let shared = server.private.diffie_hellman(&eph_pub);
    if shared.as_bytes().iter().all(|b| *b == 0) {
        return Err(RelayError::decryption_failed("ECDH produced an all-zero shared secret"));
    }

    let mut info = Vec::with_capacity(
        HKDF_INFO_PREFIX.len() + 1 + kid.len() + 1 + eph_pub_der.len() + 1 + server.public_der.len(),
    );
    info.extend_from_slice(HKDF_INFO_PREFIX);
    info.push(0);
    info.extend_from_slice(kid.as_bytes());
    info.push(0);
    info.extend_from_slice(eph_pub_der);
    info.push(0);
    info.extend_from_slice(&server.public_der);

    let hk = Hkdf::<Sha256>::new(Some(iv), shared.as_bytes());
    let mut content_key = [0u8; 32];
    hk.expand(&info, &mut content_key)
        .map_err(|_| RelayError::decryption_failed("HKDF expand failed"))?;

    Ok(content_key)
}

/// Decrypts a v2 envelope, verifying `kid` against `server.key_id` first
/// so an unrecognized key is rejected before any cryptographic work runs.
pub fn decrypt(server: &ServerKey, envelope: &[u8]) -> Result<Vec<u8>, RelayError> {
    let header = parse_header(envelope)?;

    if header.kid != server.key_id {
        return Err(RelayError::decryption_failed("unknown kid"));
    }

    let content_key = derive_content_key(server, header.eph_pub_der, &header.iv, header.kid)?;

    let mut combined = Vec::with_capacity(header.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(header.ciphertext);
    combined.extend_from_slice(header.tag);

    let cipher = Aes256Gcm::new(GenericArray::from_slice(&content_key));
    cipher
        .decrypt(
            GenericArray::from_slice(&header.iv),
            Payload {
                msg: &combined,
                aad: header.header_bytes,
            },
        )
        .map_err(|_| RelayError::decryption_failed("v2 AEAD verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn server_key() -> ServerKey {
        ServerKey::new("k1".to_string(), StaticSecret::random_from_rng(OsRng))
    }

    fn seal(server: &ServerKey, kid: &str, plaintext: &[u8]) -> Vec<u8> {
        let eph_private = StaticSecret::random_from_rng(OsRng);
        let eph_public = PublicKey::from(&eph_private);
        let eph_pub_der = spki::encode(eph_public.as_bytes());

        let server_public = PublicKey::from(&server.private);
        let server_public_der = spki::encode(server_public.as_bytes());

        let iv: [u8; 12] = {
            let mut iv = [0u8; 12];
            rand::RngCore::fill_bytes(&mut OsRng, &mut iv);
            iv
        };

        let mut header = Vec::new();
        header.extend_from_slice(MAGIC);
        header.push(2);
        header.push(kid.len() as u8);
        header.extend_from_slice(&(eph_pub_der.len() as u16).to_be_bytes());
        header.extend_from_slice(&iv);
        header.extend_from_slice(kid.as_bytes());
        header.extend_from_slice(&eph_pub_der);

        let shared = eph_private.diffie_hellman(&server_public);
        let mut info = Vec::new();
        info.extend_from_slice(HKDF_INFO_PREFIX);
        info.push(0);
        info.extend_from_slice(kid.as_bytes());
        info.push(0);
        info.extend_from_slice(&eph_pub_der);
        info.push(0);
        info.extend_from_slice(&server_public_der);

        let hk = Hkdf::<Sha256>::new(Some(&iv), shared.as_bytes());
        let mut content_key = [0u8; 32];
        hk.expand(&info, &mut content_key).unwrap();

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&content_key));
        let combined = cipher
            .encrypt(
                GenericArray::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: &header,
                },
            )
            .unwrap();
        let (ciphertext, tag) = combined.split_at(combined.len() - TAG_LEN);

        let mut envelope = header;
        envelope.extend_from_slice(tag);
        envelope.extend_from_slice(ciphertext);
        envelope
    }

    #[test]
    fn round_trips() {
        let server = server_key();
        let envelope = seal(&server, "k1", b"payload for v2");
        let plaintext = decrypt(&server, &envelope).unwrap();
        assert_eq!(plaintext, b"payload for v2");
    }

    #[test]
    fn rejects_unknown_kid() {
        let server = server_key();
        let envelope = seal(&server, "other", b"payload");
        assert!(decrypt(&server, &envelope).is_err());
    }

    #[test]
    fn any_header_bit_flip_breaks_aad_binding() {
        let server = server_key();
        let mut envelope = seal(&server, "k1", b"payload");
        envelope[9] ^= 0x01;
        assert!(decrypt(&server, &envelope).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let server = server_key();
        let mut envelope = seal(&server, "k1", b"payload");
        envelope[4] = 3;
        assert!(decrypt(&server, &envelope).is_err());
    }
}
