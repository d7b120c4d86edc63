//! HTTP client for the chromedriver metadata and download host.

use reqwest::StatusCode;
use std::time::Duration;

use crate::{H2pError, Result};

pub const DEFAULT_DRIVER_BASE_URL: &str = "https://chromedriver.storage.googleapis.com";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DriverRepository {
    client: reqwest::Client,
    base_url: String,
}

impl DriverRepository {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_DRIVER_BASE_URL, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("h2p/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Looks up `LATEST_RELEASE_{prefix}`. A 404 means the host has no
    /// driver for that prefix and yields `None`.
    pub async fn latest_release(&self, prefix: &str) -> Result<Option<String>> {
        let url = format!("{}/LATEST_RELEASE_{}", self.base_url, prefix);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(H2pError::driver_download(status));
        }

        let version = response.text().await?.trim().to_string();
        Ok((!version.is_empty()).then_some(version))
    }

    /// Downloads the zip archive for `driver_version`.
    pub async fn download_archive(
        &self,
        driver_version: &str,
        archive_name: &str,
    ) -> Result<Vec<u8>> {
        let url = format!("{}/{}/{}", self.base_url, driver_version, archive_name);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(H2pError::driver_download(status));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
