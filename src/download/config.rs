//! Engine configuration.

use std::time::Duration;

use super::constants::{
    BACKOFF_STEP, CONNECT_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, MAX_BACKOFF,
    MAX_REDIRECTS, READ_TIMEOUT,
};
use super::retry::{RetryPolicy, RetryScope};
use crate::user_agent::DEFAULT_USER_AGENT;

/// Everything the dispatcher needs, passed in explicitly at construction.
///
/// # Defaults
///
/// | field | default |
/// |-------|---------|
/// | `concurrency` | 12 agents |
/// | `retry` | 5 attempts, sleep `min(2s * attempt, 10s)`, uniform scope |
/// | `connect_timeout` | 10s |
/// | `read_timeout` | 180s |
/// | `max_redirects` | 10 |
/// | `user_agent` | `Mozilla/5.0 (Windows NT 10.0; Win64; x64)` |
/// | `landing_url` | none (no cookie warm-up, no default `Referer`) |
/// | `proxy` | none (direct, environment ignored) |
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Number of agents in the pool.
    pub concurrency: usize,
    /// Retry budget and backoff.
    pub retry: RetryPolicy,
    /// Per-request connect timeout.
    pub connect_timeout: Duration,
    /// Per-request read timeout.
    pub read_timeout: Duration,
    /// Redirect hops followed per request.
    pub max_redirects: usize,
    /// User-Agent shared by all agents.
    pub user_agent: String,
    /// Page each agent visits once to collect cookies; also the default `Referer`.
    pub landing_url: Option<String>,
    /// Proxy applied to every agent, `host:port` or full URL.
    pub proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::new(
                DEFAULT_MAX_ATTEMPTS,
                BACKOFF_STEP,
                MAX_BACKOFF,
                RetryScope::Uniform,
            ),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            max_redirects: MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            landing_url: None,
            proxy: None,
        }
    }
}

impl FetchConfig {
    /// Sets the agent pool size.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets connect and read timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Sets the landing URL used for cookie warm-up and `Referer`.
    #[must_use]
    pub fn with_landing_url(mut self, landing_url: Option<String>) -> Self {
        self.landing_url = landing_url;
        self
    }

    /// Sets the proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }
}
