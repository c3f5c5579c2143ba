//! HEAD probe: size, range support and validation token.

use reqwest::Method;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, ETAG, HeaderMap, LAST_MODIFIED};
use tracing::{debug, instrument};

use super::client::HttpClient;

/// What a HEAD request revealed about a resource.
///
/// Built fresh on every attempt; never carried across retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// `Content-Length`, if present and numeric.
    pub total_size: Option<u64>,
    /// `Accept-Ranges: bytes` was advertised.
    pub supports_range: bool,
    /// `ETag`, else `Last-Modified`; sent back as `If-Range`.
    pub validation_token: Option<String>,
}

impl ProbeResult {
    /// Probe result carrying no information.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Issues a HEAD for `url` and reads its metadata.
///
/// Probing is advisory: transport failures and non 2xx/3xx statuses yield
/// [`ProbeResult::unknown`] instead of an error, and the caller falls back to
/// a full download.
#[instrument(level = "debug", skip(client, headers), fields(url = %url))]
pub async fn probe(client: &HttpClient, url: &str, headers: &HeaderMap) -> ProbeResult {
    let response = match client.send(Method::HEAD, url, headers).await {
        Ok(response) => response,
        Err(error) => {
            debug!(error = %error, "probe failed, treating metadata as unknown");
            return ProbeResult::unknown();
        }
    };

    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        debug!(status = status.as_u16(), "probe returned non-success status");
        return ProbeResult::unknown();
    }

    let result = probe_result_from_headers(response.headers());
    debug!(
        total_size = ?result.total_size,
        supports_range = result.supports_range,
        has_validator = result.validation_token.is_some(),
        "probe complete"
    );
    result
}

pub(crate) fn probe_result_from_headers(headers: &HeaderMap) -> ProbeResult {
    let total_size = header_str(headers, CONTENT_LENGTH.as_str())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let supports_range = header_str(headers, ACCEPT_RANGES.as_str())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("bytes"));
    let validation_token = header_str(headers, ETAG.as_str())
        .or_else(|| header_str(headers, LAST_MODIFIED.as_str()))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string);

    ProbeResult {
        total_size,
        supports_range,
        validation_token,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
