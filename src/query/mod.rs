//! Metadata queries against an installed package.
//!
//! Two flavours of the same operation:
//!
//! - `json` - `xrepo fetch --json`, aggregating every array element
//! - `text` - `xrepo fetch --cflags`, for tools without JSON support; yields
//!   at most one include and one link directory
//!
//! Their results intentionally differ for the same package.

mod json;
mod text;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use json::{fetch_json, parse_json};
pub use text::{fetch_text, parse_cflags};

/// Directories (and libraries) describing an installed package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchResult {
    pub include_dirs: Vec<PathBuf>,
    pub link_dirs: Vec<PathBuf>,
    /// Libraries to link, in xrepo's order
    pub links: Vec<String>,
    /// System libraries to link
    pub syslinks: Vec<String>,
    pub defines: Vec<String>,
    /// Build-config module name to its descriptor directory
    pub config_dirs: BTreeMap<String, PathBuf>,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.include_dirs.is_empty()
            && self.link_dirs.is_empty()
            && self.links.is_empty()
            && self.syslinks.is_empty()
            && self.defines.is_empty()
            && self.config_dirs.is_empty()
    }
}
