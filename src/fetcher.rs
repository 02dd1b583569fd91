//! Package fetch pipeline.
//!
//! `fetch` runs, in order: mode translation, executable lookup (bootstrapping
//! if allowed), `xrepo install`, the JSON feature probe, the metadata query
//! and finally publication. Any failing step stops the pipeline; nothing
//! later runs.

use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::config::Settings;
use crate::download::{Downloader, HttpDownloader};
use crate::http::HttpClient;
use crate::installer::install;
use crate::locator::Locator;
use crate::options::{query_args, translate};
use crate::probe::supports_json_output;
use crate::publish::{Published, publish};
use crate::query::{fetch_json, fetch_text};
use crate::request::PackageRequest;
use crate::runtime::Runtime;

/// Fetches packages with one settings snapshot.
///
/// The located executable and the probe answer are computed at most once per
/// `Fetcher` and reused for every later request.
pub struct Fetcher<R: Runtime, D: Downloader> {
    runtime: R,
    downloader: D,
    settings: Settings,
    executable: OnceLock<PathBuf>,
    json_support: OnceLock<bool>,
}

impl<R: Runtime> Fetcher<R, HttpDownloader> {
    /// Fetcher that bootstraps over HTTP when it has to.
    pub fn new(runtime: R, settings: Settings) -> Result<Self> {
        let downloader = HttpDownloader::new(HttpClient::with_defaults()?);
        Ok(Self::with_downloader(runtime, downloader, settings))
    }
}

impl<R: Runtime, D: Downloader> Fetcher<R, D> {
    pub fn with_downloader(runtime: R, downloader: D, settings: Settings) -> Self {
        Self {
            runtime,
            downloader,
            settings,
            executable: OnceLock::new(),
            json_support: OnceLock::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Path of the xrepo executable, locating or bootstrapping it on first use.
    pub async fn executable(&self) -> Result<PathBuf> {
        if let Some(path) = self.executable.get() {
            return Ok(path.clone());
        }

        let locator = Locator::new(&self.runtime, &self.downloader, &self.settings);
        let path = locator.locate_or_install().await?;
        info!("Using xrepo at {:?}", path);
        Ok(self.executable.get_or_init(|| path).clone())
    }

    fn supports_json(&self, executable: &std::path::Path) -> Result<bool> {
        if let Some(supported) = self.json_support.get() {
            return Ok(*supported);
        }
        let supported = supports_json_output(&self.runtime, &self.settings, executable)?;
        Ok(*self.json_support.get_or_init(|| supported))
    }

    /// Install `request` and publish its directories.
    ///
    /// Returns an empty [`Published`] without touching anything when the
    /// fetcher is disabled.
    #[tracing::instrument(skip(self, request), fields(package = request.spec()))]
    pub async fn fetch(&self, request: &PackageRequest) -> Result<Published> {
        if self.settings.disabled {
            debug!("Package fetching disabled, skipping {}", request.spec());
            return Ok(Published::default());
        }

        let install_args = translate(request, &self.settings)?;
        let query_args = query_args(request, &self.settings)?;

        let executable = self.executable().await?;
        install(&self.runtime, &executable, &install_args, request.spec())?;

        let result = if self.supports_json(&executable)? {
            fetch_json(&self.runtime, &executable, &query_args, request.spec())?
        } else {
            fetch_text(
                &self.runtime,
                &executable,
                &query_args,
                request.spec(),
                request.base_name(),
            )?
        };

        Ok(publish(request.name(), &result, request.directory_scope()))
    }

    /// Fetch every request in order, merging the results. Stops at the first
    /// failure.
    pub async fn fetch_all(&self, requests: &[PackageRequest]) -> Result<Published> {
        let mut published = Published::default();
        for request in requests {
            published.merge(self.fetch(request).await?);
        }
        Ok(published)
    }
}
