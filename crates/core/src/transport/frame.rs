//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! The plaintext frame carried inside a decrypted envelope:
//! `metadataLen(4 BE) || metadataJson(UTF-8) || binaryData`.

use serde_json::{Map, Value};

use crate::error::RelayError;

/// A decoded plaintext frame: the request's JSON metadata and its
/// out-of-band binary attachment.
#[derive(Debug, Clone)]
pub struct Frame {
    pub metadata: Map<String, Value>,
    pub binary: Vec<u8>,
}

impl Frame {
    pub fn parse(plaintext: &[u8]) -> Result<Self, RelayError> {
        if plaintext.len() < 4 {
            return Err(RelayError::decryption_failed("frame shorter than length prefix"));
        }

        let metadata_len = u32::from_be_bytes(plaintext[0..4].try_into().unwrap()) as usize;
        let rest = &plaintext[4..];
        if rest.len() < metadata_len {
            return Err(RelayError::decryption_failed("frame truncated before end of metadata"));
        }

        let (meta_bytes, binary) = rest.split_at(metadata_len);
        let metadata_str = std::str::from_utf8(meta_bytes)
            .map_err(|_| RelayError::decryption_failed("metadata is not valid UTF-8"))?;

        let value: Value = serde_json::from_str(metadata_str)
            .map_err(|e| RelayError::decryption_failed(format!("metadata is not valid JSON: {e}")))?;

        let metadata = match value {
            Value::Object(map) => map,
            _ => return Err(RelayError::decryption_failed("metadata must be a JSON object")),
        };

        Ok(Frame {
            metadata,
            binary: binary.to_vec(),
        })
    }
}
