//! Key Codec Module
//!
//! Deterministic cache-key construction from a namespace, a domain and
//! ordered parts.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Delimiter between key segments.
pub const KEY_DELIMITER: char = ':';

// == Key Part ==
/// A single key segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Text(String),
    Int(i64),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Text(s) => f.write_str(s),
            KeyPart::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Text(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Text(value.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        // Window timestamps and ids fit comfortably; larger values keep their digits.
        match i64::try_from(value) {
            Ok(n) => KeyPart::Int(n),
            Err(_) => KeyPart::Text(value.to_string()),
        }
    }
}

// == Build Key ==
/// Joins `namespace`, `domain` and `parts` with `:`.
///
/// The codec never sorts or hashes; callers canonicalize structured parts
/// first (see [`canonical_json`] and [`sorted_ids`]).
pub fn build_key(namespace: &str, domain: &str, parts: &[KeyPart]) -> String {
    let mut key = String::with_capacity(namespace.len() + domain.len() + parts.len() * 8 + 2);
    key.push_str(namespace);
    key.push(KEY_DELIMITER);
    key.push_str(domain);
    for part in parts {
        key.push(KEY_DELIMITER);
        key.push_str(&part.to_string());
    }
    key
}

// == Canonical JSON ==
/// Serializes a JSON value with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Returns a sorted copy of an ID list, for parameters where order is insignificant.
pub fn sorted_ids<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    let mut out: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
    out.sort();
    out
}

// == Key Codec ==
/// Key builder bound to an application namespace.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    namespace: String,
}

impl KeyCodec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `<namespace>:<domain>:<parts...>`
    pub fn key(&self, domain: &str, parts: &[KeyPart]) -> String {
        build_key(&self.namespace, domain, parts)
    }

    /// Key for a query result: `<namespace>:db:<table>:<operation>:<canonical params>`.
    pub fn query_key<P: Serialize>(&self, table: &str, operation: &str, params: &P) -> Result<String> {
        let params = serde_json::to_value(params)?;
        Ok(self.key(
            "db",
            &[table.into(), operation.into(), canonical_json(&params).into()],
        ))
    }

    /// Counter key for one identity in one fixed window.
    pub fn rate_limit_key(&self, identity: &str, window_start_ms: u64) -> String {
        self.key("rate-limit", &[identity.into(), window_start_ms.into()])
    }
}
