//! Error types for the download module.
//!
//! [`DownloadError`] covers everything that can go wrong while fetching a
//! single file; the retry controller consumes it and, once the retry budget
//! is exhausted, its message becomes the `error` field of a result record.
//! [`EngineError`] is reserved for setup failures that happen before any
//! task is dispatched.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while transferring one file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Server signalled a temporary block (418 / 429).
    #[error("temporary block (HTTP {status}) downloading {url}")]
    TemporaryBlock {
        /// The blocked URL.
        url: String,
        /// 418 or 429.
        status: u16,
    },

    /// 416 that could not be healed by re-probing.
    #[error("range not satisfiable for {url} (local partial {partial_bytes} bytes)")]
    RangeNotSatisfiable {
        /// The URL the range was requested from.
        url: String,
        /// Size of the local partial when the 416 was received.
        partial_bytes: u64,
    },

    /// A 206 response whose `Content-Range` does not start where we asked.
    #[error("range mismatch for {url}: requested offset {requested}, server sent {received:?}")]
    RangeMismatch {
        /// The URL that returned the unexpected range.
        url: String,
        /// Offset sent in the `Range` header.
        requested: u64,
        /// Start offset from `Content-Range`, if it could be parsed.
        received: Option<u64>,
    },

    /// Partial file size does not match the known total after a transfer.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Partial file that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// File system error (open, write, truncate, rename).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Redirect chain longer than the configured hop limit.
    #[error("too many redirects ({hops}) starting from {url}")]
    TooManyRedirects {
        /// The URL originally requested.
        url: String,
        /// Number of hops followed before giving up.
        hops: usize,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Maps a reqwest send/stream error, promoting timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a temporary-block error.
    pub fn temporary_block(url: impl Into<String>, status: u16) -> Self {
        Self::TemporaryBlock {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an unhealed-416 error.
    pub fn range_not_satisfiable(url: impl Into<String>, partial_bytes: u64) -> Self {
        Self::RangeNotSatisfiable {
            url: url.into(),
            partial_bytes,
        }
    }

    /// Creates a range mismatch error.
    pub fn range_mismatch(url: impl Into<String>, requested: u64, received: Option<u64>) -> Self {
        Self::RangeMismatch {
            url: url.into(),
            requested,
            received,
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a redirect-limit error.
    pub fn too_many_redirects(url: impl Into<String>, hops: usize) -> Self {
        Self::TooManyRedirects {
            url: url.into(),
            hops,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry.

/// Setup errors raised before a batch starts.
///
/// Per-file failures never surface here; they end up in result records.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Concurrency outside the accepted range.
    #[error("invalid concurrency value {value}: must be between {min} and {max}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
        /// Lower bound.
        min: usize,
        /// Upper bound.
        max: usize,
    },

    /// Proxy string could not be turned into a reqwest proxy.
    #[error("invalid proxy {proxy}: {source}")]
    InvalidProxy {
        /// Normalized proxy URL.
        proxy: String,
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Landing URL is not a valid absolute URL.
    #[error("invalid landing URL: {url}")]
    InvalidLandingUrl {
        /// The rejected value.
        url: String,
    },

    /// reqwest refused the client configuration.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Target directory could not be created.
    #[error("failed to create target directory {path}: {source}")]
    CreateTargetDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/file.zip");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/file.zip"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/file.zip", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/file.zip"),
            "Expected URL in: {msg}"
        );
    }

    #[test]
    fn test_download_error_temporary_block_display() {
        let error = DownloadError::temporary_block("https://example.com/a.zip", 429);
        let msg = error.to_string();
        assert!(msg.contains("temporary block"), "got: {msg}");
        assert!(msg.contains("429"), "got: {msg}");
    }

    #[test]
    fn test_download_error_range_mismatch_display() {
        let error = DownloadError::range_mismatch("https://example.com/a.zip", 100, Some(0));
        let msg = error.to_string();
        assert!(msg.contains("offset 100"), "got: {msg}");
        assert!(msg.contains("Some(0)"), "got: {msg}");
    }

    #[test]
    fn test_download_error_integrity_display() {
        let error = DownloadError::integrity("/tmp/a.zip.part", 10, 7);
        let msg = error.to_string();
        assert!(msg.contains("expected 10 bytes, got 7"), "got: {msg}");
        assert!(msg.contains("/tmp/a.zip.part"), "got: {msg}");
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.zip"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/test.zip"), "Expected path in: {msg}");
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "got: {msg}");
        assert!(msg.contains("not-a-url"), "got: {msg}");
    }

    #[test]
    fn test_engine_error_invalid_concurrency_display() {
        let error = EngineError::InvalidConcurrency {
            value: 0,
            min: 1,
            max: 100,
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid concurrency value 0"), "got: {msg}");
        assert!(msg.contains("between 1 and 100"), "got: {msg}");
    }
}
