//! Constants for the download module (timeouts, pool size, retry budget).

use std::time::Duration;

/// Default HTTP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default HTTP read timeout (large archives over slow mirrors).
pub const READ_TIMEOUT: Duration = Duration::from_secs(180);

/// Default number of agents in the pool.
pub const DEFAULT_CONCURRENCY: usize = 12;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default attempts per file, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Linear backoff step: attempt `n` sleeps `n * step`.
pub const BACKOFF_STEP: Duration = Duration::from_secs(2);

/// Upper bound on a single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Suffix appended to the final path while bytes are in flight.
pub const PART_SUFFIX: &str = ".part";
