//! Error types for rapid-media

use std::sync::Arc;
use thiserror::Error;

/// Main error type for rapid-media operations
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Script pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Script evaluation error: {0}")]
    Evaluation(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Mux failed: {0}")]
    Mux(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No suitable format found")]
    NoFormatFound,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A failure handed to every caller waiting on the same cached computation
    #[error("{0}")]
    Shared(Arc<MediaError>),
}

/// Coarse error classes surfaced to the orchestration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or transport failure
    Fetch,
    /// Page markup or payload shape unexpected
    Parse,
    /// The host's player script changed shape
    HostChanged,
    /// Stream transfer failed
    Download,
    /// External remux tool failed
    Mux,
    /// Cancelled by the caller
    Cancelled,
    /// Local file system failure
    Io,
}

impl MediaError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Fetch(_) | MediaError::HttpStatus { .. } => ErrorKind::Fetch,
            MediaError::Parse(_)
            | MediaError::Json(_)
            | MediaError::Url(_)
            | MediaError::InvalidUrl(_)
            | MediaError::NoFormatFound => ErrorKind::Parse,
            MediaError::PatternNotFound(_)
            | MediaError::Decode(_)
            | MediaError::Evaluation(_)
            | MediaError::Regex(_) => ErrorKind::HostChanged,
            MediaError::Download(_) => ErrorKind::Download,
            MediaError::Mux(_) => ErrorKind::Mux,
            MediaError::Cancelled => ErrorKind::Cancelled,
            MediaError::Io(_) => ErrorKind::Io,
            MediaError::Shared(inner) => inner.kind(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            MediaError::Fetch(_) | MediaError::Download(_) | MediaError::Io(_) => true,
            MediaError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            MediaError::Shared(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Check if error signals that the host's script format changed
    pub fn is_host_change(&self) -> bool {
        self.kind() == ErrorKind::HostChanged
    }

    /// Take the error out of a cache's shared result, wrapping it when other
    /// waiters still hold it
    pub(crate) fn from_shared(shared: Arc<MediaError>) -> MediaError {
        match Arc::try_unwrap(shared) {
            Ok(err) => err,
            Err(shared) => MediaError::Shared(shared),
        }
    }

    /// Fold transport and file errors raised mid-transfer into `Download`.
    pub(crate) fn into_download(self) -> MediaError {
        match self {
            MediaError::Fetch(e) => MediaError::Download(e.to_string()),
            MediaError::HttpStatus { status, url } => {
                MediaError::Download(format!("HTTP {} for {}", status, url))
            }
            MediaError::Io(e) => MediaError::Download(e.to_string()),
            MediaError::Shared(inner) if matches!(inner.kind(), ErrorKind::Fetch | ErrorKind::Io) => {
                MediaError::Download(inner.to_string())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(MediaError::Parse("x".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            MediaError::PatternNotFound("cipher".into()).kind(),
            ErrorKind::HostChanged
        );
        assert_eq!(MediaError::Evaluation("x".into()).kind(), ErrorKind::HostChanged);
        assert_eq!(MediaError::Mux("exit 1".into()).kind(), ErrorKind::Mux);
        assert_eq!(MediaError::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(MediaError::Decode("x".into()).is_host_change());
    }

    #[test]
    fn test_is_retryable() {
        let server_error = MediaError::HttpStatus {
            status: 503,
            url: "https://x.test".into(),
        };
        let not_found = MediaError::HttpStatus {
            status: 404,
            url: "https://x.test".into(),
        };
        assert!(server_error.is_retryable());
        assert!(!not_found.is_retryable());
        assert!(MediaError::Download("reset".into()).is_retryable());
        assert!(!MediaError::PatternNotFound("n".into()).is_retryable());
        assert!(!MediaError::Cancelled.is_retryable());
    }

    #[test]
    fn test_into_download() {
        let io = MediaError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(matches!(io.into_download(), MediaError::Download(msg) if msg.contains("disk full")));
        assert!(matches!(MediaError::Cancelled.into_download(), MediaError::Cancelled));
    }

    #[test]
    fn test_shared_errors_keep_their_kind() {
        let only = MediaError::from_shared(Arc::new(MediaError::Parse("x".into())));
        assert!(matches!(only, MediaError::Parse(_)));

        let shared = Arc::new(MediaError::HttpStatus {
            status: 503,
            url: "https://x.test".into(),
        });
        let held = shared.clone();
        let err = MediaError::from_shared(shared);
        assert!(matches!(err, MediaError::Shared(_)));
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), held.to_string());
    }
}
