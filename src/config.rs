//! Process-wide settings, resolved once and passed to every operation.

use anyhow::{Context, Result};
use log::debug;
use semver::Version;
use std::path::{Path, PathBuf};

use crate::request::Mode;
use crate::runtime::Runtime;

/// xmake release downloaded when bootstrapping.
pub const DEFAULT_XMAKE_RELEASE: &str = "v2.9.9";

/// Where xmake source releases are published.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com/xmake-io/xmake/releases/download";

/// Oldest host build tool able to consume `xrepo fetch --json` output.
pub const MIN_JSON_HOST_VERSION: Version = Version::new(3, 19, 0);

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Turn every operation into a no-op
    pub disabled: bool,
    /// Force diagnosis output for every install
    pub verbose: bool,
    /// Download and build xmake when no executable is found
    pub bootstrap: bool,
    /// Explicit path to the xrepo executable
    pub executable: Option<PathBuf>,
    /// Directory that receives bootstrap artifacts, see [`Settings::build_dir`]
    pub build_dir: Option<PathBuf>,
    /// Pinned xmake release tag used by the bootstrap
    pub xmake_release: String,
    /// Base URL the release archive is fetched from
    pub download_url: String,
    /// Version of the build tool consuming the results, when known
    pub host_tool_version: Option<Version>,
    /// Mode used when a request does not name one
    pub default_mode: Mode,
}

impl Settings {
    /// Read settings from the environment.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `XREPO_PACKAGE_DISABLE` | disable everything |
    /// | `XREPO_PACKAGE_VERBOSE` | diagnosis output for every install |
    /// | `XREPO_BOOTSTRAP_XMAKE` | bootstrap xmake when missing |
    /// | `XREPO_EXECUTABLE` | explicit executable path |
    /// | `XREPO_BUILD_DIR`, `OUT_DIR` | bootstrap directory |
    /// | `XMAKE_RELEASE_LATEST` | pinned xmake release |
    /// | `XREPO_XMAKE_DOWNLOAD_URL` | release download base URL |
    /// | `XREPO_HOST_TOOL_VERSION` | host build tool version |
    /// | `PROFILE` | default mode (set by Cargo for build scripts) |
    pub fn from_env<R: Runtime>(runtime: &R) -> Result<Self> {
        let var = |key: &str| runtime.env_var(key).ok().filter(|v| !v.trim().is_empty());
        let flag = |key: &str| var(key).is_some_and(|v| parse_flag(&v));

        let build_dir = var("XREPO_BUILD_DIR")
            .or_else(|| var("OUT_DIR"))
            .map(PathBuf::from)
            .or_else(|| runtime.cache_dir().map(|dir| dir.join("xrepo-fetch")));

        let host_tool_version = var("XREPO_HOST_TOOL_VERSION")
            .map(|v| parse_loose_version(&v))
            .transpose()?;

        let default_mode = match var("PROFILE").as_deref() {
            Some("debug") => Mode::Debug,
            _ => Mode::Release,
        };

        let settings = Self {
            disabled: flag("XREPO_PACKAGE_DISABLE"),
            verbose: flag("XREPO_PACKAGE_VERBOSE"),
            bootstrap: flag("XREPO_BOOTSTRAP_XMAKE"),
            executable: var("XREPO_EXECUTABLE").map(PathBuf::from),
            build_dir,
            xmake_release: var("XMAKE_RELEASE_LATEST")
                .unwrap_or_else(|| DEFAULT_XMAKE_RELEASE.to_string()),
            download_url: var("XREPO_XMAKE_DOWNLOAD_URL")
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_URL.to_string()),
            host_tool_version,
            default_mode,
        };
        debug!("Settings: {:?}", settings);
        Ok(settings)
    }

    /// Directory for bootstrap artifacts.
    ///
    /// Only the bootstrap needs it, so a missing location is reported here
    /// rather than when the settings are read.
    pub fn build_dir(&self) -> Result<&Path> {
        self.build_dir
            .as_deref()
            .context("Could not determine a build directory; set XREPO_BUILD_DIR")
    }

    /// Directory the bootstrapped xmake is installed into.
    pub fn bootstrap_prefix(&self) -> Result<PathBuf> {
        Ok(self.build_dir()?.join("xmake"))
    }

    /// Whether the consuming build tool is too old for JSON results.
    pub fn host_tool_too_old(&self) -> bool {
        self.host_tool_version
            .as_ref()
            .is_some_and(|v| *v < MIN_JSON_HOST_VERSION)
    }
}

/// Interpret an on/off environment value.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes" | "y"
    )
}

/// Parse `3`, `3.19` or `3.19.2` (trailing suffixes like `-rc1` allowed).
pub fn parse_loose_version(s: &str) -> Result<Version> {
    let s = s.trim().trim_start_matches('v');
    let core_len = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (core, rest) = s.split_at(core_len);
    if core.is_empty() {
        anyhow::bail!("Invalid version '{}'", s);
    }
    let mut parts: Vec<&str> = core.split('.').filter(|p| !p.is_empty()).collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    let normalized = format!("{}{}", parts.join("."), rest);
    Version::parse(&normalized).with_context(|| format!("Invalid version '{}'", s))
}
