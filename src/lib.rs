pub mod archive;
pub mod bootstrap;
pub mod config;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod installer;
pub mod locator;
pub mod options;
pub mod probe;
pub mod publish;
pub mod query;
pub mod request;
pub mod runtime;

pub use config::Settings;
pub use error::{BootstrapStep, FetchError};
pub use fetcher::Fetcher;
pub use publish::{OutputFormat, Published, SearchPaths, Variable};
pub use query::FetchResult;
pub use request::{Mode, PackageRequest, Verbosity};
