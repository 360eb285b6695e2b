use std::time::Duration;

use reqwest::StatusCode;

/// Retry behaviour for a single mirror.
///
/// `max_attempts` counts every request, the first one included. The delay before
/// retry `n` (1-based) is `backoff_factor * 2^(n-1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: Duration,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: Duration::from_millis(500),
            retry_statuses: vec![500, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_factor.saturating_mul(1u32 << exp)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub retry: RetryPolicy,
    /// Write buffer size used while streaming a response body to disk.
    pub chunk_size: usize,
    pub user_agent: String,
    pub connect_timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_size: 8 * 1024,
            user_agent: concat!("databundle/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Keep existing content of the destination directory instead of wiping it first.
    pub keep: bool,
    /// Single end-to-end deadline for the whole install.
    pub timeout: Option<Duration>,
}

impl InstallOptions {
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
