//! Failure taxonomy for the fetch pipeline.
//!
//! Every variant is fatal: the enclosing build is expected to stop. The
//! errors travel inside `anyhow::Error`, so callers that care about the
//! failing step can `downcast_ref::<FetchError>()`.

use std::fmt;

/// Step of the xmake bootstrap that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    Download,
    Extract,
    Build,
    Install,
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStep::Download => "download",
            BootstrapStep::Extract => "extract",
            BootstrapStep::Build => "build",
            BootstrapStep::Install => "install",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum FetchError {
    /// No executable found and bootstrapping is disabled
    Locate(String),
    /// One of the bootstrap steps failed
    Bootstrap { step: BootstrapStep, reason: String },
    /// The help invocation used for feature probing failed
    Probe { code: String },
    /// `xrepo install` exited non-zero
    Install { package: String, code: String },
    /// `xrepo fetch` exited non-zero
    Query { package: String, code: String },
    /// Query output could not be understood
    Parse { package: String, reason: String },
    /// Mode other than debug/release
    InvalidMode(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Locate(msg) => write!(f, "xrepo executable not found: {}", msg),
            FetchError::Bootstrap { step, reason } => {
                write!(f, "Bootstrapping xmake failed at {} step: {}", step, reason)
            }
            FetchError::Probe { code } => {
                write!(f, "Probing xrepo fetch capabilities failed (exit code {})", code)
            }
            FetchError::Install { package, code } => {
                write!(f, "xrepo install {} failed (exit code {})", package, code)
            }
            FetchError::Query { package, code } => {
                write!(f, "xrepo fetch {} failed (exit code {})", package, code)
            }
            FetchError::Parse { package, reason } => {
                write!(f, "Failed to parse xrepo fetch output for {}: {}", package, reason)
            }
            FetchError::InvalidMode(mode) => write!(
                f,
                "Unsupported mode '{}': expected 'debug' or 'release'",
                mode
            ),
        }
    }
}

impl std::error::Error for FetchError {}
