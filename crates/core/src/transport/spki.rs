//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Minimal RFC 8410 SubjectPublicKeyInfo encode/decode for X25519 keys.
//!
//! The encoding is a fixed 12-byte prefix followed by the 32 raw key
//! bytes — there's no ASN.1 in sight that a general-purpose `der` crate
//! would earn its keep over, so this is hand-rolled against the RFC.

use crate::error::RelayError;

/// `SEQUENCE { SEQUENCE { OID 1.3.101.110 }, BIT STRING (0 unused bits) }`
const SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
];

pub const SPKI_LEN: usize = SPKI_PREFIX.len() + 32;

pub fn encode(public_key: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SPKI_LEN);
    out.extend_from_slice(&SPKI_PREFIX);
    out.extend_from_slice(public_key);
    out
}

pub fn decode(der: &[u8]) -> Result<[u8; 32], RelayError> {
    if der.len() != SPKI_LEN || der[..SPKI_PREFIX.len()] != SPKI_PREFIX {
        return Err(RelayError::decryption_failed("malformed X25519 SPKI key"));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&der[SPKI_PREFIX.len()..]);
    Ok(key)
}
