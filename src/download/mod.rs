use crate::http::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::path::Path;

/// Fetches a remote file onto local disk.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// [`Downloader`] backed by [`HttpClient`].
pub struct HttpDownloader {
    http_client: HttpClient,
}

impl HttpDownloader {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    #[tracing::instrument(skip(self))]
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {}...", url);

        let bytes = self
            .http_client
            .download_file(url, || {
                std::fs::File::create(dest)
                    .with_context(|| format!("Failed to create file at {:?}", dest))
            })
            .await?;

        info!("Download complete.");
        Ok(bytes)
    }
}
