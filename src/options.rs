//! Translation of a [`PackageRequest`] into xrepo command-line flags.

use anyhow::Result;

use crate::config::Settings;
use crate::request::{Mode, PackageRequest, Verbosity};

/// Flag for the output level, `None` for normal output.
///
/// The global verbose switch wins over whatever the request asks for.
pub fn verbosity_flag(verbosity: Verbosity, verbose_all: bool) -> Option<&'static str> {
    let verbosity = if verbose_all {
        Verbosity::Diagnosis
    } else {
        verbosity
    };
    match verbosity {
        Verbosity::Diagnosis => Some("-vD"),
        Verbosity::Verbose => Some("-v"),
        Verbosity::Quiet => Some("-q"),
        Verbosity::Normal => None,
    }
}

/// `--mode=debug|release`; fails for anything but those two, in any case.
pub fn mode_flag(mode: Option<&str>, default_mode: Mode) -> Result<String> {
    let mode = match mode {
        Some(raw) => raw.parse::<Mode>()?,
        None => default_mode,
    };
    Ok(format!("--mode={}", mode))
}

/// `--configs=k=v,...`, absent when there are no configs.
pub fn configs_flag(configs: &[(String, String)]) -> Option<String> {
    if configs.is_empty() {
        return None;
    }
    let joined = configs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");
    Some(format!("--configs={}", joined))
}

/// Flags shared by `install` and `fetch`: mode and configs.
pub fn query_args(request: &PackageRequest, settings: &Settings) -> Result<Vec<String>> {
    let mut args = vec![mode_flag(request.mode(), settings.default_mode)?];
    args.extend(configs_flag(request.configs()));
    Ok(args)
}

/// Full flag list for `xrepo install`: output level, mode and configs.
pub fn translate(request: &PackageRequest, settings: &Settings) -> Result<Vec<String>> {
    let mut args: Vec<String> = verbosity_flag(request.verbosity(), settings.verbose)
        .map(str::to_string)
        .into_iter()
        .collect();
    args.extend(query_args(request, settings)?);
    Ok(args)
}
