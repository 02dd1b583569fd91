//! Retry classification for downloads.

/// Maximum number of attempts for a download.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// A download failure that will not go away by trying again.
#[derive(Debug)]
pub enum NonRetryableError {
    /// HTTP 404: usually a mistyped release tag
    NotFound(String),
    /// Any other 4xx answer
    ClientError(u16, String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::NotFound(url) => {
                write!(f, "Not found: {}. Check XMAKE_RELEASE_LATEST.", url)
            }
            NonRetryableError::ClientError(status, url) => {
                write!(f, "Request error: HTTP {} for {}", status, url)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Turn a status error into a `NonRetryableError` for 4xx answers.
/// Server errors and transport failures are left as-is and will be retried.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unknown url>".to_string());

    match error.status() {
        Some(status) if status == reqwest::StatusCode::NOT_FOUND => {
            anyhow::Error::from(NonRetryableError::NotFound(url))
        }
        Some(status) if status.is_client_error() => {
            anyhow::Error::from(NonRetryableError::ClientError(status.as_u16(), url))
        }
        _ => anyhow::Error::from(error),
    }
}
