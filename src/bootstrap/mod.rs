//! Bootstrap of a local xmake installation from a pinned source release.
//!
//! Download `xmake-<tag>.tar.gz`, unpack it under the build directory, run
//! `make build` and `make install PREFIX=<build_dir>/xmake`. The resulting
//! `bin/xrepo` is what the locator hands back.

use anyhow::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::archive::TarGzExtractor;
use crate::config::Settings;
use crate::download::Downloader;
use crate::error::{BootstrapStep, FetchError};
use crate::runtime::{CommandSpec, Runtime};

/// Name of the package front-end installed alongside xmake.
pub const EXECUTABLE_NAME: &str = "xrepo";

pub struct Bootstrapper<'a, R: Runtime, D: Downloader> {
    runtime: &'a R,
    downloader: &'a D,
    settings: &'a Settings,
}

impl<'a, R: Runtime, D: Downloader> Bootstrapper<'a, R, D> {
    pub fn new(runtime: &'a R, downloader: &'a D, settings: &'a Settings) -> Self {
        Self {
            runtime,
            downloader,
            settings,
        }
    }

    /// URL of the pinned source archive.
    pub fn archive_url(&self) -> String {
        let tag = &self.settings.xmake_release;
        format!(
            "{}/{}/xmake-{}.tar.gz",
            self.settings.download_url.trim_end_matches('/'),
            tag,
            tag
        )
    }

    /// Where `make install` leaves the executable.
    pub fn installed_executable(&self) -> Result<PathBuf> {
        Ok(self
            .settings
            .bootstrap_prefix()?
            .join("bin")
            .join(EXECUTABLE_NAME))
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<PathBuf> {
        if cfg!(windows) {
            return Err(failure(
                BootstrapStep::Download,
                "bootstrapping xmake is not supported on Windows; install xmake and set XREPO_EXECUTABLE",
            ));
        }

        let build_dir = self
            .settings
            .build_dir()
            .map_err(|e| failure(BootstrapStep::Download, e))?;
        let tag = &self.settings.xmake_release;
        info!("Bootstrapping xmake {} into {:?}", tag, build_dir);

        self.runtime
            .create_dir_all(build_dir)
            .map_err(|e| failure(BootstrapStep::Download, e))?;

        let archive = build_dir.join(format!("xmake-{}.tar.gz", tag));
        let url = self.archive_url();
        self.downloader
            .download(&url, &archive)
            .await
            .map_err(|e| failure(BootstrapStep::Download, e))?;

        let source_dir = build_dir.join("xmake-src");
        self.extract(&archive, &source_dir)
            .map_err(|e| failure(BootstrapStep::Extract, e))?;
        if let Err(e) = self.runtime.remove_file(&archive) {
            warn!("Failed to remove {:?}: {}", archive, e);
        }

        info!("Building xmake...");
        self.make(BootstrapStep::Build, &source_dir, &["build".to_string()])?;

        let prefix = self.settings.bootstrap_prefix()?;
        info!("Installing xmake to {:?}...", prefix);
        self.make(
            BootstrapStep::Install,
            &source_dir,
            &["install".to_string(), format!("PREFIX={}", prefix.display())],
        )?;

        let executable = self.installed_executable()?;
        if !self.runtime.exists(&executable) {
            return Err(failure(
                BootstrapStep::Install,
                format!("{:?} missing after make install", executable),
            ));
        }

        info!("xmake bootstrapped: {:?}", executable);
        Ok(executable)
    }

    fn extract(&self, archive: &Path, source_dir: &Path) -> Result<()> {
        if self.runtime.exists(source_dir) {
            self.runtime.remove_dir_all(source_dir)?;
        }
        TarGzExtractor.extract(self.runtime, archive, source_dir)
    }

    fn make(&self, step: BootstrapStep, dir: &Path, args: &[String]) -> Result<()> {
        let command = CommandSpec::new("make")
            .args(args.iter().cloned())
            .current_dir(dir);
        let output = self
            .runtime
            .run(&command)
            .map_err(|e| failure(step, e))?;

        if !output.success() {
            return Err(failure(
                step,
                format!(
                    "`{}` exited with code {}: {}",
                    command,
                    output.code_display(),
                    output.stderr.trim()
                ),
            ));
        }
        Ok(())
    }
}

fn failure(step: BootstrapStep, reason: impl std::fmt::Display) -> anyhow::Error {
    anyhow::Error::from(FetchError::Bootstrap {
        step,
        reason: format!("{:#}", reason),
    })
}
