//! docfetch core library
//!
//! Fetches an ordered list of document URLs into a directory, each file
//! exactly once, surviving interrupted runs, partial transfers, temporary
//! server blocks and stale range state.
//!
//! # Architecture
//!
//! - [`download`] - transport, probe, resumable transfer, retry, agents and
//!   the dispatcher
//! - [`user_agent`] - identity headers shared by all agents
//!
//! The host decides where URLs come from and what happens to the files;
//! the library only returns one [`ResultRecord`] per task, in task order.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod user_agent;

// Re-export commonly used types
pub use download::{
    BatchSummary, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DownloadError, DownloadTask,
    EngineError, FetchConfig, FetchEngine, ResultRecord, RetryPolicy, RetryScope, build_tasks,
    fetch_all, normalize_proxy,
};
