//! Resumable, concurrent document fetching.
//!
//! Layers, leaves first:
//!
//! - [`HttpClient`]: one request/response cycle with manual redirects
//! - [`probe()`]: HEAD for size, range support and validator
//! - [`ResumableTransfer`]: one attempt at one file, via a `.part` sibling
//! - [`with_retries`]: bounded retry loop with linear backoff
//! - [`Agent`]: a worker's HTTP session
//! - [`FetchEngine`]: shared queue, agent pool, ordered results
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use docfetch_core::download::{build_tasks, fetch_all};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tasks = build_tasks(&["https://example.com/docs/R2-1903010.zip"]);
//! let records = fetch_all(tasks, Path::new("./DOCS"), Some("proxy.local:3128"), 12).await?;
//! assert_eq!(records.len(), 1);
//! # Ok(())
//! # }
//! ```

mod agent;
mod client;
mod config;
mod constants;
mod engine;
mod error;
mod filename;
mod probe;
mod proxy;
mod retry;
mod transfer;

pub use agent::{Agent, AgentIdentity};
pub use client::{HttpClient, TransportSettings};
pub use config::FetchConfig;
pub use constants::{
    BACKOFF_STEP, CONNECT_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, MAX_BACKOFF,
    MAX_CONCURRENCY, MAX_REDIRECTS, MIN_CONCURRENCY, PART_SUFFIX, READ_TIMEOUT,
};
pub use engine::{
    BatchSummary, DownloadTask, FetchEngine, ProgressCallback, ResultRecord, build_tasks,
    fetch_all,
};
pub use error::{DownloadError, EngineError};
pub use filename::{
    FALLBACK_EXTENSION, FALLBACK_FILE_NAME, file_name_from_url, part_path,
    stem_and_extension_from_url,
};
pub use probe::{ProbeResult, probe};
pub use proxy::{env_proxy_for_scheme, normalize_proxy};
pub use retry::{
    FailureType, RetryDecision, RetryExhausted, RetryPolicy, RetryScope, classify_error,
    with_retries,
};
pub use transfer::{ResumableTransfer, TransferOutcome};
