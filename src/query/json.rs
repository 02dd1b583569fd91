use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::FetchResult;
use crate::error::FetchError;
use crate::runtime::{CommandSpec, Runtime};

/// One element of the `xrepo fetch --json` array. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct PackageInfo {
    #[serde(default)]
    includedirs: Vec<String>,
    #[serde(default)]
    linkdirs: Vec<String>,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    syslinks: Vec<String>,
    #[serde(default)]
    defines: Vec<String>,
}

/// Run `xrepo fetch --json` and collect the result.
#[tracing::instrument(skip(runtime, executable, query_args))]
pub fn fetch_json<R: Runtime>(
    runtime: &R,
    executable: &Path,
    query_args: &[String],
    package: &str,
) -> Result<FetchResult> {
    let command = CommandSpec::new(executable)
        .args(["fetch", "--json"])
        .args(query_args.iter().cloned())
        .arg(package);
    let output = runtime
        .run(&command)
        .with_context(|| format!("Failed to run `{}`", command))?;

    if !output.success() {
        if !output.stderr.is_empty() {
            warn!("{}", output.stderr.trim_end());
        }
        return Err(FetchError::Query {
            package: package.to_string(),
            code: output.code_display(),
        }
        .into());
    }

    parse_json(runtime, package, &output.stdout)
}

/// Parse `xrepo fetch --json` output.
///
/// Every array element is flattened into the same lists: the first element is
/// the requested package, the rest are its dependencies, and their
/// directories are not attributed back to individual package names. Each link
/// directory is scanned for a `cmake/` subfolder whose immediate
/// subdirectories become config-module entries.
pub fn parse_json<R: Runtime>(runtime: &R, package: &str, stdout: &str) -> Result<FetchResult> {
    let infos: Vec<PackageInfo> =
        serde_json::from_str(stdout.trim()).map_err(|e| FetchError::Parse {
            package: package.to_string(),
            reason: e.to_string(),
        })?;

    if infos.is_empty() {
        warn!("xrepo fetch returned no package info for {}", package);
    }

    let mut result = FetchResult::default();
    for info in infos {
        result
            .include_dirs
            .extend(info.includedirs.into_iter().map(PathBuf::from));
        result.links.extend(info.links);
        result.syslinks.extend(info.syslinks);
        result.defines.extend(info.defines);

        for linkdir in info.linkdirs.into_iter().map(PathBuf::from) {
            discover_config_dirs(runtime, &linkdir, &mut result)?;
            result.link_dirs.push(linkdir);
        }
    }

    debug!("Fetched {}: {:?}", package, result);
    Ok(result)
}

fn discover_config_dirs<R: Runtime>(
    runtime: &R,
    linkdir: &Path,
    result: &mut FetchResult,
) -> Result<()> {
    let cmake_dir = linkdir.join("cmake");
    if !runtime.is_dir(&cmake_dir) {
        return Ok(());
    }

    for entry in runtime.read_dir(&cmake_dir)? {
        if !runtime.is_dir(&entry) {
            continue;
        }
        if let Some(name) = entry.file_name() {
            let name = name.to_string_lossy().into_owned();
            debug!("Config module {} at {:?}", name, entry);
            result.config_dirs.insert(name, entry);
        }
    }
    Ok(())
}
