//! Versioned binary codec.
//!
//! Every encoded payload starts with a 2-byte big-endian codec version followed
//! by the bincode encoding of the value. The version is part of the wire
//! contract: transaction IDs are hashes of these bytes.

use crate::{TypesError, TypesResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Codec version written by this node.
pub const CODEC_VERSION: u16 = 0;

/// Encode a value with the current codec version.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> TypesResult<Vec<u8>> {
    let body = bincode::serialize(value).map_err(|e| TypesError::Codec(e.to_string()))?;
    let mut bytes = Vec::with_capacity(2 + body.len());
    bytes.extend_from_slice(&CODEC_VERSION.to_be_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode a value, rejecting unknown codec versions.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> TypesResult<T> {
    if bytes.len() < 2 {
        return Err(TypesError::Codec("payload too short".to_string()));
    }
    let version = u16::from_be_bytes([bytes[0], bytes[1]]);
    if version != CODEC_VERSION {
        return Err(TypesError::UnsupportedCodecVersion(version));
    }
    bincode::deserialize(&bytes[2..]).map_err(|e| TypesError::Codec(e.to_string()))
}
