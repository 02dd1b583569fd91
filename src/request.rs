//! Package requests and the user-facing knobs that go with them.

use anyhow::{Result, anyhow};
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// Build variant requested from the package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Debug,
    #[default]
    Release,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Debug => "debug",
            Mode::Release => "release",
        }
    }
}

impl FromStr for Mode {
    type Err = FetchError;

    /// Accepts exactly `debug` or `release`, in any letter case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Mode::Debug),
            "release" => Ok(Mode::Release),
            _ => Err(FetchError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How chatty `xrepo install` should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Normal,
    Diagnosis,
    Verbose,
    Quiet,
}

impl FromStr for Verbosity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "normal" => Ok(Verbosity::Normal),
            "diag" | "diagnosis" => Ok(Verbosity::Diagnosis),
            "verbose" => Ok(Verbosity::Verbose),
            "quiet" => Ok(Verbosity::Quiet),
            other => Err(anyhow!(
                "Unknown output level '{}': expected default, diag, verbose or quiet",
                other
            )),
        }
    }
}

/// Parse a single `key=value` package config.
pub fn parse_config(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid config '{}': expected KEY=VALUE", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Invalid config '{}': empty key", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parse a comma separated `k=v,k2=v2` list, as accepted by `xrepo --configs`.
pub fn parse_configs(s: &str) -> Result<Vec<(String, String)>> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_config)
        .collect()
}

/// A single package to install and query.
///
/// Built once with the `with_*` methods and then handed to the fetcher,
/// which only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    spec: String,
    alias: Option<String>,
    configs: Vec<(String, String)>,
    mode: Option<String>,
    verbosity: Verbosity,
    directory_scope: bool,
}

impl PackageRequest {
    /// `spec` is the package as xrepo understands it, e.g. `"zlib 1.2.11"`.
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into().trim().to_string(),
            alias: None,
            configs: Vec::new(),
            mode: None,
            verbosity: Verbosity::Normal,
            directory_scope: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configs.push((key.into(), value.into()));
        self
    }

    pub fn with_configs<I>(mut self, configs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.configs.extend(configs);
        self
    }

    /// The mode is kept verbatim and validated when translated to flags.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_directory_scope(mut self, enabled: bool) -> Self {
        self.directory_scope = enabled;
        self
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Name used as the prefix of published variables: the alias when set,
    /// otherwise the package spec up to the first whitespace (`"zlib 1.2.11"` -> `zlib`).
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.base_name())
    }

    /// Package name without version or alias (`"zlib 1.2.11"` -> `zlib`).
    pub fn base_name(&self) -> &str {
        self.spec.split_whitespace().next().unwrap_or(&self.spec)
    }

    pub fn configs(&self) -> &[(String, String)] {
        &self.configs
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn directory_scope(&self) -> bool {
        self.directory_scope
    }
}
