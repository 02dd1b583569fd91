//! Feature probe: does this xrepo understand `fetch --json`?

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use crate::config::Settings;
use crate::error::FetchError;
use crate::runtime::{CommandSpec, Runtime};

/// Marker looked for in `xrepo fetch --help`.
const JSON_MARKER: &str = "--json";

/// Returns true when `xrepo fetch --json` can be used.
///
/// A host build tool older than [`crate::config::MIN_JSON_HOST_VERSION`] is
/// answered without running anything.
#[tracing::instrument(skip(runtime, settings))]
pub fn supports_json_output<R: Runtime>(
    runtime: &R,
    settings: &Settings,
    executable: &Path,
) -> Result<bool> {
    if settings.host_tool_too_old() {
        debug!(
            "Host build tool {:?} predates JSON support, using --cflags",
            settings.host_tool_version
        );
        return Ok(false);
    }

    let command = CommandSpec::new(executable).args(["fetch", "--help"]);
    let output = runtime
        .run(&command)
        .with_context(|| format!("Failed to run `{}`", command))?;
    if !output.success() {
        return Err(FetchError::Probe {
            code: output.code_display(),
        }
        .into());
    }

    let supported = output.stdout.contains(JSON_MARKER);
    debug!("xrepo fetch --json supported: {}", supported);
    Ok(supported)
}
