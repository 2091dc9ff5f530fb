//! Artifact downloads from the content distribution network

use crate::traits::Fetcher;
use async_trait::async_trait;
use gpuprov_core::{ProvisionError, ProvisionResult};
use std::path::Path;
use tracing::{debug, info};

/// HTTP-backed artifact fetcher
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> ProvisionResult<()> {
        info!(url, dest = %dest.display(), "Downloading artifact");

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisionError::Fetch(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ProvisionError::Fetch(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProvisionError::Fetch(format!("reading {} failed: {}", url, e)))?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn exists(&self, url: &str) -> bool {
        let found = match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        };
        debug!(url, found, "Probed URL");
        found
    }
}

/// File name component of a URL, used to place downloads in a scratch dir
pub fn url_file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_file_name() {
        assert_eq!(
            url_file_name("https://host/path/NVIDIA-Linux-x86_64-535.104.05.run"),
            "NVIDIA-Linux-x86_64-535.104.05.run"
        );
        assert_eq!(url_file_name("plain-name.deb"), "plain-name.deb");
    }
}
