//! `xrepo install`.

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;

use crate::error::FetchError;
use crate::runtime::{CommandSpec, Runtime};

/// Run `<executable> install --yes <args> <package>`.
///
/// Anything but exit code zero is fatal; nothing is retried.
#[tracing::instrument(skip(runtime, executable, args))]
pub fn install<R: Runtime>(
    runtime: &R,
    executable: &Path,
    args: &[String],
    package: &str,
) -> Result<()> {
    let command = CommandSpec::new(executable)
        .args(["install", "--yes"])
        .args(args.iter().cloned())
        .arg(package);
    info!("Installing {}...", package);

    let output = runtime
        .run(&command)
        .with_context(|| format!("Failed to run `{}`", command))?;

    for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
        info!("{}", line);
    }

    if !output.success() {
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            warn!("{}", line);
        }
        return Err(FetchError::Install {
            package: package.to_string(),
            code: output.code_display(),
        }
        .into());
    }

    Ok(())
}
