//! Transport client: one HTTP request/response cycle.
//!
//! [`HttpClient`] wraps a `reqwest::Client` configured with explicit
//! timeouts, an explicit proxy decision and an optional cookie jar.
//! Redirects are followed here rather than by reqwest so that range headers
//! can be dropped on cross-host hops.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{
    ACCEPT_ENCODING, HeaderMap, HeaderValue, IF_RANGE, LOCATION, RANGE, REFERER,
};
use reqwest::{Client, Method, Proxy, StatusCode, redirect};
use tracing::{debug, trace};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, MAX_REDIRECTS, READ_TIMEOUT};
use super::error::{DownloadError, EngineError};

/// Connection settings shared by every request a client makes.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Maximum idle time between body reads.
    pub read_timeout: Duration,
    /// Normalized proxy URL; `None` means direct and ignores the environment.
    pub proxy: Option<String>,
    /// Redirect hops followed before failing.
    pub max_redirects: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            proxy: None,
            max_redirects: MAX_REDIRECTS,
        }
    }
}

/// HTTP client issuing HEAD/GET requests with manual redirect handling.
///
/// Cheap to clone; clones share the connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_redirects: usize,
}

impl HttpClient {
    /// Builds a client from `settings`, storing cookies in `cookie_jar`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidProxy`] when the proxy string is rejected
    /// and [`EngineError::ClientBuild`] when reqwest refuses the configuration.
    pub fn new(settings: &TransportSettings, cookie_jar: Arc<Jar>) -> Result<Self, EngineError> {
        let mut builder = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .redirect(redirect::Policy::none())
            .cookie_provider(cookie_jar);

        builder = match settings.proxy.as_deref() {
            Some(proxy) => {
                let resolved = Proxy::all(proxy).map_err(|source| EngineError::InvalidProxy {
                    proxy: proxy.to_string(),
                    source,
                })?;
                builder.proxy(resolved)
            }
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|source| EngineError::ClientBuild { source })?;
        Ok(Self {
            client,
            max_redirects: settings.max_redirects,
        })
    }

    /// Sends `method` to `url` and returns the first non-redirect response.
    ///
    /// `Accept-Encoding: identity` is added unless `headers` sets it, so
    /// lengths and offsets refer to the stored bytes. On redirects:
    /// - 303 turns any method except HEAD into GET
    /// - `Referer` is set to the previous URL if the caller did not set one
    /// - `Range` and `If-Range` are dropped when the host changes
    ///
    /// The status is not checked; callers decide what each status means.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for unparseable URLs or
    /// `Location` values, [`DownloadError::TooManyRedirects`] once the hop
    /// limit is exceeded, and `Timeout`/`Network` for transport failures.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<reqwest::Response, DownloadError> {
        let mut current_url = parse_http_url(url)?;
        let mut method = method;
        let mut headers = headers.clone();
        if !headers.contains_key(ACCEPT_ENCODING) {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        }

        let mut hops = 0usize;
        loop {
            trace!(%method, url = %current_url, hops, "sending request");
            let response = self
                .client
                .request(method.clone(), current_url.clone())
                .headers(headers.clone())
                .send()
                .await
                .map_err(|e| DownloadError::from_reqwest(url, e))?;

            let status = response.status();
            if !is_followed_redirect(status) {
                return Ok(response);
            }
            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                return Ok(response);
            };

            if hops >= self.max_redirects {
                return Err(DownloadError::too_many_redirects(url, hops));
            }
            let next_url = current_url
                .join(location)
                .map_err(|_| DownloadError::invalid_url(location.to_string()))?;

            if status == StatusCode::SEE_OTHER && method != Method::HEAD {
                method = Method::GET;
            }
            if !headers.contains_key(REFERER)
                && let Ok(referer) = HeaderValue::from_str(current_url.as_str())
            {
                headers.insert(REFERER, referer);
            }
            if !same_authority(&current_url, &next_url) {
                headers.remove(RANGE);
                headers.remove(IF_RANGE);
            }

            debug!(
                from = %current_url,
                to = %next_url,
                status = status.as_u16(),
                "following redirect"
            );
            current_url = next_url;
            hops += 1;
        }
    }
}

fn parse_http_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url.trim()).map_err(|_| DownloadError::invalid_url(url))?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(parsed)
    } else {
        Err(DownloadError::invalid_url(url))
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn same_authority(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
