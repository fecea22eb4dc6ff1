//! Upstash REST Backend
//!
//! Speaks the Redis-over-HTTP protocol: each command is a JSON array posted
//! to the base URL with a bearer token, answered by `{"result": ...}` or
//! `{"error": "..."}`. Batches go to `<url>/pipeline`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::backend::{RemoteBackend, SetEx};
use crate::error::{CacheError, Result};

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

impl CommandReply {
    fn into_result(self) -> Result<Value> {
        match self.error {
            Some(message) => Err(CacheError::Backend(message)),
            None => Ok(self.result),
        }
    }
}

// == Upstash Backend ==
#[derive(Debug, Clone)]
pub struct UpstashBackend {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl UpstashBackend {
    /// Builds a client with a per-request timeout. No request is made.
    pub fn new(url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn command(&self, args: Vec<Value>) -> Result<Value> {
        let name = args.first().cloned().unwrap_or(Value::Null);
        debug!(command = %name, "remote command");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        let reply: CommandReply = response.json().await?;
        if let Some(message) = reply.error {
            return Err(CacheError::Backend(format!("{} ({})", message, status)));
        }
        if !status.is_success() {
            return Err(CacheError::Backend(format!("unexpected status {}", status)));
        }
        Ok(reply.result)
    }

    async fn pipeline(&self, commands: Vec<Vec<Value>>) -> Result<Vec<Value>> {
        let response = self
            .client
            .post(format!("{}/pipeline", self.url))
            .bearer_auth(&self.token)
            .json(&commands)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Backend(format!("unexpected status {}", status)));
        }
        let replies: Vec<CommandReply> = response.json().await?;
        replies.into_iter().map(CommandReply::into_result).collect()
    }
}

fn cmd<const N: usize>(parts: [&str; N]) -> Vec<Value> {
    parts.iter().map(|p| Value::String((*p).to_string())).collect()
}

fn as_count(value: &Value) -> u64 {
    value.as_u64().unwrap_or(0)
}

fn as_payload(value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(CacheError::Backend(format!(
            "expected string reply, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RemoteBackend for UpstashBackend {
    async fn ping(&self) -> Result<()> {
        self.command(cmd(["PING"])).await.map(|_| ())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        as_payload(self.command(cmd(["GET", key])).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let ttl = ttl_seconds.to_string();
        self.command(cmd(["SETEX", key, ttl.as_str(), value])).await.map(|_| ())
    }

    async fn del(&self, key: &str) -> Result<u64> {
        Ok(as_count(&self.command(cmd(["DEL", key])).await?))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(as_count(&self.command(cmd(["EXISTS", key])).await?) == 1)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool> {
        let ttl = ttl_seconds.to_string();
        Ok(as_count(&self.command(cmd(["EXPIRE", key, ttl.as_str()])).await?) == 1)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = cmd(["MGET"]);
        args.extend(keys.iter().map(|k| Value::String(k.clone())));

        match self.command(args).await? {
            Value::Array(items) if items.len() == keys.len() => {
                items.into_iter().map(as_payload).collect()
            }
            other => Err(CacheError::Backend(format!(
                "MGET returned {} for {} keys",
                other,
                keys.len()
            ))),
        }
    }

    async fn set_ex_batch(&self, entries: &[SetEx]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let commands = entries
            .iter()
            .map(|e| {
                let ttl = e.ttl_seconds.to_string();
                cmd(["SETEX", e.key.as_str(), ttl.as_str(), e.value.as_str()])
            })
            .collect();
        self.pipeline(commands).await.map(|_| ())
    }

    async fn flush_all(&self) -> Result<()> {
        self.command(cmd(["FLUSHALL"])).await.map(|_| ())
    }
}
