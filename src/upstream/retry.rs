use reqwest::StatusCode;

const DEFAULT_ATTEMPTS: u32 = 2;

/// Bounded retry for credential-bearing provider calls.
///
/// Only `401 Unauthorized` is retryable: it is the signal that the cached
/// client credentials were rotated. Between attempts the caller evicts the
/// credentials so the next attempt reads the new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` tries in total, at least one.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED
    }

    /// `attempt` is 1-based: the attempt that just failed with `status`.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, status: StatusCode) -> bool {
        Self::is_retryable(status) && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS)
    }
}
