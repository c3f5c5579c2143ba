//! Work queue and dispatcher.
//!
//! [`FetchEngine`] takes an ordered task list and a target directory, skips
//! targets that already exist, and fans the rest out to a fixed pool of
//! [`Agent`]s pulling from one shared FIFO. Every task yields exactly one
//! [`ResultRecord`]; the list comes back sorted by task index.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use docfetch_core::download::{FetchConfig, FetchEngine, build_tasks};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tasks = build_tasks(&["https://www.3gpp.org/ftp/Docs/R2-1903010.zip"]);
//! let engine = FetchEngine::new(FetchConfig::default().with_concurrency(4))?;
//! let records = engine.fetch_all(tasks, Path::new("./DOCS")).await?;
//! for record in &records {
//!     println!("{} -> {} ({:?})", record.url, record.saved_path, record.error);
//! }
//! # Ok(())
//! # }
//! ```

mod task;

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Proxy;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use task::{BatchSummary, DownloadTask, ResultRecord, build_tasks};

use super::agent::Agent;
use super::config::FetchConfig;
use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::error::EngineError;
use super::proxy::normalize_proxy;
use super::retry::RetryPolicy;
use crate::user_agent::tool_identity;

/// Observer called once per record as soon as it is produced.
pub type ProgressCallback = Arc<dyn Fn(&ResultRecord) + Send + Sync>;

const CANCELLED_MESSAGE: &str = "cancelled before transfer";
const LOST_MESSAGE: &str = "agent stopped before recording a result";

/// Dispatcher over a fixed pool of agents.
pub struct FetchEngine {
    config: FetchConfig,
    cancelled: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for FetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEngine")
            .field("config", &self.config)
            .field("cancelled", &self.cancelled)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl FetchEngine {
    /// Validates `config` and creates an engine.
    ///
    /// The proxy is normalized (`http://` added when no scheme is given).
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidConcurrency`] outside `1..=100`
    /// - [`EngineError::InvalidProxy`] when reqwest rejects the proxy
    /// - [`EngineError::InvalidLandingUrl`] when the landing URL is not http(s)
    #[instrument(level = "debug", skip(config), fields(concurrency = config.concurrency))]
    pub fn new(mut config: FetchConfig) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
            return Err(EngineError::InvalidConcurrency {
                value: config.concurrency,
                min: MIN_CONCURRENCY,
                max: MAX_CONCURRENCY,
            });
        }

        config.proxy = config.proxy.as_deref().and_then(normalize_proxy);
        if let Some(proxy) = config.proxy.as_deref() {
            Proxy::all(proxy).map_err(|source| EngineError::InvalidProxy {
                proxy: proxy.to_string(),
                source,
            })?;
        }

        if let Some(landing) = config.landing_url.as_deref() {
            let valid = Url::parse(landing)
                .is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
            if !valid {
                return Err(EngineError::InvalidLandingUrl {
                    url: landing.to_string(),
                });
            }
        }

        debug!(
            max_attempts = config.retry.max_attempts(),
            scope = ?config.retry.scope(),
            proxy = config.proxy.as_deref().unwrap_or("NONE"),
            "creating fetch engine"
        );

        Ok(Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Registers an observer for each produced record.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ResultRecord) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Flag that stops agents from claiming further tasks once set.
    ///
    /// Transfers already in flight run to completion or failure.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches every task into `target_dir` and returns records sorted by index.
    ///
    /// Tasks whose final file exists are recorded as skipped without any
    /// request. Per-task failures never fail the batch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CreateTargetDir`] when `target_dir` cannot be
    /// created, or a client build error before any task is dispatched.
    #[instrument(skip(self, tasks), fields(target_dir = %target_dir.display(), tasks = tasks.len()))]
    pub async fn fetch_all(
        &self,
        tasks: Vec<DownloadTask>,
        target_dir: &Path,
    ) -> Result<Vec<ResultRecord>, EngineError> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|source| EngineError::CreateTargetDir {
                path: target_dir.to_path_buf(),
                source,
            })?;

        let total = tasks.len();
        let originals = tasks.clone();
        let results: Arc<Mutex<Vec<ResultRecord>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let mut pending = VecDeque::new();

        for task in tasks {
            let final_path = task.final_path(target_dir);
            if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
                debug!(index = task.index, path = %final_path.display(), "target exists, skipping");
                let record = ResultRecord::skipped(&task, target_dir);
                self.notify(&record);
                push_record(&results, record);
            } else {
                pending.push_back(task);
            }
        }

        let agent_count = self.config.concurrency.min(pending.len());
        info!(
            identity = %tool_identity(),
            total,
            pending = pending.len(),
            agents = agent_count,
            "starting batch"
        );

        let agents = (0..agent_count)
            .map(|id| Agent::new(id, &self.config))
            .collect::<Result<Vec<_>, _>>()?;

        let queue = Arc::new(Mutex::new(pending));
        let done = Arc::new(AtomicUsize::new(total - queue_len(&queue)));
        let mut handles = Vec::with_capacity(agents.len());

        for agent in agents {
            let worker = Worker {
                agent,
                queue: Arc::clone(&queue),
                results: Arc::clone(&results),
                target_dir: target_dir.to_path_buf(),
                policy: self.config.retry.clone(),
                cancelled: Arc::clone(&self.cancelled),
                progress: self.progress.clone(),
                done: Arc::clone(&done),
                total,
            };
            handles.push(tokio::spawn(worker.run()));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "agent task panicked");
            }
        }

        let leftovers: Vec<DownloadTask> = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in &leftovers {
            let record = ResultRecord::failed(task, target_dir, CANCELLED_MESSAGE);
            self.notify(&record);
            push_record(&results, record);
        }

        let mut records = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        let recorded: HashSet<usize> = records.iter().map(|r| r.index).collect();
        let missing: Vec<&DownloadTask> = originals
            .iter()
            .filter(|task| !recorded.contains(&task.index))
            .collect();
        if !missing.is_empty() {
            warn!(count = missing.len(), "tasks left without a record");
        }
        for task in missing {
            records.push(ResultRecord::failed(task, target_dir, LOST_MESSAGE));
        }

        records.sort_by_key(|r| r.index);
        let summary = BatchSummary::from_records(&records);
        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = leftovers.len(),
            "batch complete"
        );
        Ok(records)
    }

    fn notify(&self, record: &ResultRecord) {
        if let Some(progress) = &self.progress {
            progress(record);
        }
    }
}

/// One agent plus the shared state it works against.
struct Worker {
    agent: Agent,
    queue: Arc<Mutex<VecDeque<DownloadTask>>>,
    results: Arc<Mutex<Vec<ResultRecord>>>,
    target_dir: PathBuf,
    policy: RetryPolicy,
    cancelled: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
    done: Arc<AtomicUsize>,
    total: usize,
}

impl Worker {
    async fn run(self) {
        self.agent.warm_up().await;

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                debug!(agent = self.agent.id(), "cancellation observed, stopping");
                break;
            }
            let Some(task) = self.next_task() else {
                break;
            };

            let record = self.agent.fetch(&task, &self.target_dir, &self.policy).await;

            let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                agent = self.agent.id(),
                done,
                total = self.total,
                pct = percent(done, self.total),
                index = record.index,
                ok = record.is_ok(),
                "task finished"
            );
            if let Some(progress) = &self.progress {
                progress(&record);
            }
            push_record(&self.results, record);
        }
    }

    fn next_task(&self) -> Option<DownloadTask> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

fn push_record(results: &Mutex<Vec<ResultRecord>>, record: ResultRecord) {
    results
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(record);
}

fn queue_len(queue: &Mutex<VecDeque<DownloadTask>>) -> usize {
    queue.lock().unwrap_or_else(PoisonError::into_inner).len()
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Fetches `tasks` with default settings, an optional proxy and `concurrency` agents.
///
/// # Errors
///
/// Same as [`FetchEngine::new`] and [`FetchEngine::fetch_all`].
pub async fn fetch_all(
    tasks: Vec<DownloadTask>,
    target_dir: &Path,
    proxy: Option<&str>,
    concurrency: usize,
) -> Result<Vec<ResultRecord>, EngineError> {
    let config = FetchConfig::default()
        .with_concurrency(concurrency)
        .with_proxy(proxy.map(str::to_string));
    FetchEngine::new(config)?.fetch_all(tasks, target_dir).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_new_rejects_zero_concurrency() {
        let result = FetchEngine::new(FetchConfig::default().with_concurrency(0));
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency { value: 0, .. })
        ));
    }

    #[test]
    fn test_new_rejects_excessive_concurrency() {
        let result = FetchEngine::new(FetchConfig::default().with_concurrency(101));
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency { value: 101, .. })
        ));
    }

    #[test]
    fn test_new_accepts_boundaries() {
        assert!(FetchEngine::new(FetchConfig::default().with_concurrency(1)).is_ok());
        assert!(FetchEngine::new(FetchConfig::default().with_concurrency(100)).is_ok());
    }

    #[test]
    fn test_new_normalizes_proxy() {
        let engine = FetchEngine::new(
            FetchConfig::default().with_proxy(Some(" proxy.local:3128 ".to_string())),
        )
        .unwrap();
        assert_eq!(
            engine.config().proxy.as_deref(),
            Some("http://proxy.local:3128")
        );
    }

    #[test]
    fn test_new_blank_proxy_means_direct() {
        let engine =
            FetchEngine::new(FetchConfig::default().with_proxy(Some("  ".to_string()))).unwrap();
        assert!(engine.config().proxy.is_none());
    }

    #[test]
    fn test_new_rejects_bad_landing_url() {
        let result = FetchEngine::new(
            FetchConfig::default().with_landing_url(Some("ftp://example.com/".to_string())),
        );
        assert!(matches!(result, Err(EngineError::InvalidLandingUrl { .. })));
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
    }

    #[tokio::test]
    async fn test_empty_batch_creates_dir_and_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("DOCS");
        let engine = FetchEngine::new(FetchConfig::default()).unwrap();
        let records = engine.fetch_all(Vec::new(), &target).await.unwrap();
        assert!(records.is_empty());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_create_target_dir_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let engine = FetchEngine::new(FetchConfig::default()).unwrap();
        let result = engine.fetch_all(Vec::new(), &blocker.join("sub")).await;
        assert!(matches!(result, Err(EngineError::CreateTargetDir { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_engine_records_every_task() {
        let dir = TempDir::new().unwrap();
        let tasks = build_tasks(&[
            "http://127.0.0.1:9/a.zip",
            "http://127.0.0.1:9/b.zip",
            "http://127.0.0.1:9/c.zip",
        ]);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_callback = Arc::clone(&seen);
        let engine = FetchEngine::new(FetchConfig::default().with_concurrency(2))
            .unwrap()
            .with_progress(move |_| {
                seen_in_callback.fetch_add(1, Ordering::SeqCst);
            });
        engine.cancel_handle().store(true, Ordering::SeqCst);

        let records = engine.fetch_all(tasks, dir.path()).await.unwrap();
        let indices: Vec<usize> = records.iter().map(|r| r.index).collect();
        assert_eq!(indices, [0, 1, 2]);
        assert!(
            records
                .iter()
                .all(|r| r.error.as_deref() == Some(CANCELLED_MESSAGE))
        );
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_existing_targets_are_skipped_without_agents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.zip"), b"done").unwrap();
        let tasks = build_tasks(&["http://127.0.0.1:9/a.zip"]);
        let records = fetch_all(tasks, dir.path(), None, 4).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].skipped);
        assert!(records[0].error.is_none());
    }
}
