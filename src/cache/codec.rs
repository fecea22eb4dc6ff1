//! Payload Codec Module
//!
//! Turns values into the strings stored in both tiers. Payloads whose JSON
//! form exceeds the threshold are gzip-compressed and base64-encoded behind
//! a `gz:` marker, which can never start a JSON document.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, Result};

/// Marker prefix for compressed payloads.
pub const COMPRESSED_PREFIX: &str = "gz:";

// == Payload Codec ==
#[derive(Debug, Clone, Copy)]
pub struct PayloadCodec {
    threshold: usize,
}

impl PayloadCodec {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Serializes `value`, compressing when the JSON is larger than the threshold.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_string(value)?;
        if json.len() <= self.threshold {
            return Ok(json);
        }

        let bytes = gzip(json.as_bytes())
            .map_err(|e| CacheError::Serialization(format!("compression failed: {}", e)))?;
        Ok(format!("{}{}", COMPRESSED_PREFIX, STANDARD.encode(bytes)))
    }

    /// Reverses [`encode`](Self::encode). Plain JSON is accepted regardless of size.
    pub fn decode<T: DeserializeOwned>(&self, payload: &str) -> Result<T> {
        match payload.strip_prefix(COMPRESSED_PREFIX) {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| CacheError::Serialization(format!("invalid base64: {}", e)))?;
                let mut json = String::new();
                GzDecoder::new(bytes.as_slice())
                    .read_to_string(&mut json)
                    .map_err(|e| CacheError::Serialization(format!("decompression failed: {}", e)))?;
                Ok(serde_json::from_str(&json)?)
            }
            None => Ok(serde_json::from_str(payload)?),
        }
    }
}

fn gzip(input: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    encoder.finish()
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(1024)
    }
}
