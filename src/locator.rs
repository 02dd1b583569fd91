//! Executable locator.
//!
//! Search order: explicit path from the settings, the system `PATH`, a
//! previous bootstrap under the build directory, and finally a fresh
//! bootstrap when enabled.

use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;

use crate::bootstrap::{Bootstrapper, EXECUTABLE_NAME};
use crate::config::Settings;
use crate::download::Downloader;
use crate::error::FetchError;
use crate::runtime::Runtime;

pub struct Locator<'a, R: Runtime, D: Downloader> {
    runtime: &'a R,
    downloader: &'a D,
    settings: &'a Settings,
}

impl<'a, R: Runtime, D: Downloader> Locator<'a, R, D> {
    pub fn new(runtime: &'a R, downloader: &'a D, settings: &'a Settings) -> Self {
        Self {
            runtime,
            downloader,
            settings,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn locate_or_install(&self) -> Result<PathBuf> {
        if let Some(explicit) = &self.settings.executable {
            if self.runtime.exists(explicit) {
                debug!("Using explicit xrepo at {:?}", explicit);
                return Ok(explicit.clone());
            }
            return Err(FetchError::Locate(format!(
                "XREPO_EXECUTABLE points to {:?}, which does not exist",
                explicit
            ))
            .into());
        }

        if let Some(found) = self.runtime.which(EXECUTABLE_NAME) {
            debug!("Found xrepo on PATH at {:?}", found);
            return Ok(found);
        }

        let bootstrapper = Bootstrapper::new(self.runtime, self.downloader, self.settings);
        if let Ok(local) = bootstrapper.installed_executable()
            && self.runtime.exists(&local)
        {
            debug!("Using previously bootstrapped xrepo at {:?}", local);
            return Ok(local);
        }

        if !self.settings.bootstrap {
            return Err(FetchError::Locate(
                "install xmake or set XREPO_BOOTSTRAP_XMAKE=ON to build it automatically"
                    .to_string(),
            )
            .into());
        }

        info!("xrepo not found, bootstrapping xmake {}", self.settings.xmake_release);
        bootstrapper.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MockDownloader;
    use crate::runtime::MockRuntime;
    use crate::test_utils::test_settings;
    use mockall::predicate::eq;
    use std::path::Path;

    fn local_xrepo() -> PathBuf {
        test_settings().bootstrap_prefix().unwrap().join("bin/xrepo")
    }

    #[tokio::test]
    async fn test_explicit_path_wins() {
        let mut settings = test_settings();
        settings.executable = Some(PathBuf::from("/opt/xmake/bin/xrepo"));

        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(Path::new("/opt/xmake/bin/xrepo")))
            .returning(|_| true);
        // PATH is never consulted
        runtime.expect_which().times(0);
        let downloader = MockDownloader::new();

        let found = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap();

        assert_eq!(found, PathBuf::from("/opt/xmake/bin/xrepo"));
    }

    #[tokio::test]
    async fn test_explicit_path_missing_is_fatal() {
        let mut settings = test_settings();
        settings.executable = Some(PathBuf::from("/missing/xrepo"));
        settings.bootstrap = true;

        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        let downloader = MockDownloader::new();

        let err = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Locate(_))
        ));
    }

    #[tokio::test]
    async fn test_found_on_path() {
        let settings = test_settings();

        let mut runtime = MockRuntime::new();
        runtime
            .expect_which()
            .with(eq("xrepo"))
            .returning(|_| Some(PathBuf::from("/usr/local/bin/xrepo")));
        let downloader = MockDownloader::new();

        let found = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap();

        assert_eq!(found, PathBuf::from("/usr/local/bin/xrepo"));
    }

    #[tokio::test]
    async fn test_previous_bootstrap_is_reused() {
        let mut settings = test_settings();
        settings.bootstrap = true;

        let mut runtime = MockRuntime::new();
        runtime.expect_which().returning(|_| None);
        runtime
            .expect_exists()
            .with(eq(local_xrepo()))
            .returning(|_| true);
        let mut downloader = MockDownloader::new();
        downloader.expect_download().times(0);

        let found = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap();

        assert_eq!(found, local_xrepo());
    }

    #[tokio::test]
    async fn test_not_found_without_bootstrap() {
        let settings = test_settings();

        let mut runtime = MockRuntime::new();
        runtime.expect_which().returning(|_| None);
        runtime.expect_exists().returning(|_| false);
        let mut downloader = MockDownloader::new();
        downloader.expect_download().times(0);

        let err = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("XREPO_BOOTSTRAP_XMAKE"));
    }

    #[tokio::test]
    async fn test_unknown_build_dir_without_bootstrap() {
        let mut settings = test_settings();
        settings.build_dir = None;

        let mut runtime = MockRuntime::new();
        runtime.expect_which().returning(|_| None);
        runtime.expect_exists().times(0);
        let downloader = MockDownloader::new();

        let err = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Locate(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_build_dir_fails_bootstrap() {
        let mut settings = test_settings();
        settings.build_dir = None;
        settings.bootstrap = true;

        let mut runtime = MockRuntime::new();
        runtime.expect_which().returning(|_| None);
        let mut downloader = MockDownloader::new();
        downloader.expect_download().times(0);

        let err = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("XREPO_BUILD_DIR"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_not_found_bootstraps_when_enabled() {
        let mut settings = test_settings();
        settings.bootstrap = true;

        let mut runtime = MockRuntime::new();
        runtime.expect_which().returning(|_| None);
        runtime.expect_exists().returning(|_| false);
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("offline")));

        let err = Locator::new(&runtime, &downloader, &settings)
            .locate_or_install()
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Bootstrap { .. })
        ));
    }
}
