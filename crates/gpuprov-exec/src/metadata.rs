//! Cluster metadata service client
//!
//! The metadata service is a key/value lookup shared by every node of the
//! cluster. Lookups never fail hard: an unreachable service or an unset key
//! yields the caller's default.

use async_trait::async_trait;
use tracing::debug;

/// Key/value lookup with a default-value fallback
#[async_trait]
pub trait Metadata: Send + Sync {
    /// Look up an attribute, returning the default when unset or unreachable
    async fn get(&self, key: &str, default: &str) -> String;

    /// Look up an attribute, mapping unset/empty to None
    async fn get_optional(&self, key: &str) -> Option<String> {
        let value = self.get(key, "").await;
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Look up a boolean flag
    async fn get_flag(&self, key: &str, default: bool) -> bool {
        let fallback = if default { "true" } else { "false" };
        self.get(key, fallback).await.eq_ignore_ascii_case("true")
    }
}

/// HTTP metadata client
#[derive(Debug, Clone)]
pub struct MetadataClient {
    base: String,
    client: reqwest::Client,
}

impl MetadataClient {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Metadata for MetadataClient {
    async fn get(&self, key: &str, default: &str) -> String {
        let url = format!("{}/{}", self.base, key);
        let value = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(text) => {
                    let trimmed = text.trim().to_string();
                    if trimmed.is_empty() {
                        default.to_string()
                    } else {
                        trimmed
                    }
                }
                Err(_) => default.to_string(),
            },
            _ => default.to_string(),
        };
        debug!(key, value = %value, "Metadata lookup");
        value
    }
}
