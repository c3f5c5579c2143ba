//! Agents: one HTTP session per worker.
//!
//! An [`Agent`] owns its client and cookie jar for its whole life. It warms
//! the jar once against the landing page, then runs every task it pulls
//! through the retry loop around a [`ResumableTransfer`].

use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Method, Url};
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, TransportSettings};
use super::config::FetchConfig;
use super::engine::{DownloadTask, ResultRecord};
use super::error::{DownloadError, EngineError};
use super::retry::{RetryPolicy, with_retries};
use super::transfer::ResumableTransfer;
use crate::user_agent::{ACCEPT_LANGUAGE as ACCEPT_LANGUAGE_VALUE, AGENT_ID_HEADER};

/// Headers an agent presents on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    /// Agent number, sent as `X-Agent-ID`.
    pub id: usize,
    /// `User-Agent` value.
    pub user_agent: String,
    /// Default `Referer`, normally the landing page.
    pub referer: Option<String>,
}

impl AgentIdentity {
    /// Builds the fixed header map. Values that are not valid header text
    /// are left out.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(AGENT_ID_HEADER, HeaderValue::from(self.id));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        if let Some(referer) = self
            .referer
            .as_deref()
            .and_then(|r| HeaderValue::from_str(r).ok())
        {
            headers.insert(REFERER, referer);
        }
        headers
    }
}

/// A worker's session: client, cookies, proxy and identity.
#[derive(Debug)]
pub struct Agent {
    identity: AgentIdentity,
    landing_url: Option<String>,
    proxy: Option<String>,
    fixed_headers: HeaderMap,
    client: HttpClient,
}

impl Agent {
    /// Creates agent `id` with a fresh cookie jar.
    ///
    /// `config.proxy` must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the HTTP client cannot be built.
    pub fn new(id: usize, config: &FetchConfig) -> Result<Self, EngineError> {
        let settings = TransportSettings {
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            proxy: config.proxy.clone(),
            max_redirects: config.max_redirects,
        };
        let client = HttpClient::new(&settings, Arc::new(Jar::default()))?;
        let identity = AgentIdentity {
            id,
            user_agent: config.user_agent.clone(),
            referer: config.landing_url.clone(),
        };
        let fixed_headers = identity.headers();

        Ok(Self {
            identity,
            landing_url: config.landing_url.clone(),
            proxy: config.proxy.clone(),
            fixed_headers,
            client,
        })
    }

    /// Agent number.
    #[must_use]
    pub fn id(&self) -> usize {
        self.identity.id
    }

    /// Visits the landing page once so the jar holds its cookies.
    ///
    /// Failures are logged and otherwise ignored.
    #[instrument(level = "debug", skip(self), fields(agent = self.identity.id))]
    pub async fn warm_up(&self) {
        let Some(landing) = self.landing_url.as_deref() else {
            return;
        };
        let mut headers = self.fixed_headers.clone();
        headers.remove(REFERER);
        match self.client.send(Method::GET, landing, &headers).await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "landing page visited");
            }
            Err(error) => warn!(error = %error, "cookie warm-up failed, continuing without"),
        }
    }

    /// Fetches `task` into `target_dir`, retrying under `policy`.
    ///
    /// Always returns a record; a terminal failure becomes its `error`.
    #[instrument(
        skip(self, task, target_dir, policy),
        fields(agent = self.identity.id, index = task.index, url = %task.url)
    )]
    pub async fn fetch(
        &self,
        task: &DownloadTask,
        target_dir: &Path,
        policy: &RetryPolicy,
    ) -> ResultRecord {
        if Url::parse(&task.url).is_err() {
            let error = DownloadError::invalid_url(task.url.as_str());
            warn!(error = %error, "skipping unparseable URL");
            return ResultRecord::failed(task, target_dir, error.to_string());
        }

        let final_path = task.final_path(target_dir);
        let client = &self.client;
        let headers = &self.fixed_headers;
        let url = task.url.as_str();
        let final_path_ref = final_path.as_path();

        let result = with_retries(policy, url, move |attempt| {
            debug!(attempt, proxy = self.proxy.as_deref().unwrap_or("NONE"), "starting attempt");
            let transfer = ResumableTransfer::new(client, headers, url, final_path_ref);
            async move { transfer.run().await }
        })
        .await;

        match result {
            Ok(outcome) => {
                info!(
                    bytes = outcome.bytes(),
                    path = %final_path.display(),
                    "saved"
                );
                ResultRecord::completed(task, target_dir)
            }
            Err(exhausted) => {
                warn!(
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "download failed after all attempts"
                );
                ResultRecord::failed(task, target_dir, exhausted.to_string())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::download::retry::RetryScope;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
            RetryScope::Uniform,
        )
    }

    #[test]
    fn test_identity_headers() {
        let identity = AgentIdentity {
            id: 7,
            user_agent: "test-agent".to_string(),
            referer: Some("https://example.com/ftp/".to_string()),
        };
        let headers = identity.headers();
        assert_eq!(headers.get(USER_AGENT).unwrap(), "test-agent");
        assert_eq!(headers.get(AGENT_ID_HEADER).unwrap(), "7");
        assert_eq!(headers.get(ACCEPT).unwrap(), "*/*");
        assert_eq!(headers.get(REFERER).unwrap(), "https://example.com/ftp/");
    }

    #[test]
    fn test_identity_without_referer() {
        let identity = AgentIdentity {
            id: 0,
            user_agent: "ua".to_string(),
            referer: None,
        };
        assert!(identity.headers().get(REFERER).is_none());
    }

    #[tokio::test]
    async fn test_warm_up_cookie_is_sent_on_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/landing"))
            .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "session=abc; Path=/"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/a.zip"))
            .and(header("cookie", "session=abc"))
            .and(header("x-agent-id", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let config = FetchConfig::default()
            .with_landing_url(Some(format!("{}/landing", server.uri())));
        let agent = Agent::new(3, &config).unwrap();
        agent.warm_up().await;

        let dir = TempDir::new().unwrap();
        let task = DownloadTask::new(0, format!("{}/files/a.zip", server.uri()), "a", ".zip");
        let record = agent.fetch(&task, dir.path(), &fast_policy(1)).await;

        assert!(record.is_ok(), "unexpected error: {:?}", record.error);
        assert_eq!(std::fs::read(dir.path().join("a.zip")).unwrap(), b"zip");
    }

    #[tokio::test]
    async fn test_warm_up_failure_is_ignored() {
        let config = FetchConfig::default()
            .with_landing_url(Some("http://127.0.0.1:9/landing".to_string()));
        let agent = Agent::new(0, &config).unwrap();
        agent.warm_up().await;
        assert_eq!(agent.id(), 0);
    }

    #[tokio::test]
    async fn test_fetch_exhaustion_becomes_record_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad.zip"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let agent = Agent::new(1, &FetchConfig::default()).unwrap();
        let dir = TempDir::new().unwrap();
        let task = DownloadTask::new(4, format!("{}/bad.zip", server.uri()), "bad", ".zip");
        let record = agent.fetch(&task, dir.path(), &fast_policy(2)).await;

        assert_eq!(record.index, 4);
        let error = record.error.unwrap();
        assert!(error.contains("2 attempt"), "got: {error}");
        assert!(error.contains("500"), "got: {error}");
        assert!(!dir.path().join("bad.zip").exists());
    }

    #[test]
    fn test_fetch_invalid_url_fails_without_retry() {
        let agent = Agent::new(0, &FetchConfig::default()).unwrap();
        let dir = TempDir::new().unwrap();
        let task = DownloadTask::new(0, "not a url", "download", ".bin");
        let record = tokio_test::block_on(agent.fetch(&task, dir.path(), &fast_policy(3)));
        assert!(record.error.unwrap().contains("invalid URL"));
    }
}
