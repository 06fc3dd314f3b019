//! Exponential backoff retry policy.
//!
//! A single [`RetryPolicy`] covers both retry flavours used by film-sync:
//!
//! - **bounded** (`max_retries = Some(n)`): gives up after `n` failed attempts
//!   and hands the last error back to the caller,
//! - **unbounded** (`max_retries = None`): retries forever. Only used on the
//!   admission path (first connection to PostgreSQL), where giving up has no
//!   meaning for a long-running worker.
//!
//! The delay before retry `n` (zero-based) is
//!
//! ```text
//! t = min(start * factor^n, border)
//! t = max(start, t + uniform(-start, start))   // jitter enabled
//! t = max(start, t)                            // jitter disabled
//! ```
//!
//! The policy does no logging. Callers log inside their operation closure,
//! where they know what failed.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use sync_backoff::RetryPolicy;
//!
//! let policy = RetryPolicy::bounded(3).with_jitter(false);
//! assert_eq!(policy.base_delay(0), Duration::from_millis(100));
//! assert_eq!(policy.base_delay(1), Duration::from_millis(200));
//! assert_eq!(policy.base_delay(20), Duration::from_secs(10));
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry configuration with exponential growth, a ceiling and optional jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Initial delay, also the lower bound for every delay.
    pub start: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Upper bound for the pre-jitter delay.
    pub border: Duration,
    /// Attempt ceiling. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Add uniform noise in `[-start, start)` to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(10)
    }
}

impl RetryPolicy {
    /// Bounded policy: 0.1s doubling up to 10s, jitter on.
    pub fn bounded(max_retries: u32) -> Self {
        Self {
            start: Duration::from_millis(100),
            factor: 2.0,
            border: Duration::from_secs(10),
            max_retries: Some(max_retries),
            jitter: true,
        }
    }

    /// Unbounded policy: 0.1s doubling up to 10s, jitter on, never gives up.
    pub fn unbounded() -> Self {
        Self {
            max_retries: None,
            ..Self::bounded(0)
        }
    }

    /// Policy wrapped around index bulk writes: 10 attempts, 0.1s to 10s.
    pub fn bulk() -> Self {
        Self::bounded(10)
    }

    /// Policy for connecting to the search index at startup: 10 attempts, 1s to 30s.
    pub fn connect() -> Self {
        Self {
            start: Duration::from_secs(1),
            border: Duration::from_secs(30),
            ..Self::bounded(10)
        }
    }

    /// Policy for the first database connection of a pass.
    pub fn admission() -> Self {
        Self::unbounded()
    }

    #[must_use]
    pub fn with_start(mut self, start: Duration) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    #[must_use]
    pub fn with_border(mut self, border: Duration) -> Self {
        self.border = border;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether this policy ever gives up.
    pub fn is_bounded(&self) -> bool {
        self.max_retries.is_some()
    }

    /// Pre-jitter delay for zero-based attempt `n`: `min(start * factor^n, border)`,
    /// never below zero. A NaN product falls back to `border`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.start.as_secs_f64() * self.factor.powi(exponent);
        let border = self.border.as_secs_f64();
        if secs.is_nan() || secs > border {
            self.border
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Actual delay for zero-based attempt `n`, jitter applied and floored at `start`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let start = self.start.as_secs_f64();
        let mut secs = self.base_delay(attempt).as_secs_f64();
        if self.jitter && start > 0.0 {
            secs += rand::rng().random_range(-start..start);
        }
        Duration::from_secs_f64(secs.max(start))
    }

    /// Run `operation` until it succeeds or the policy gives up, sleeping with
    /// `tokio::time::sleep` after each failure.
    pub async fn retry<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.retry_with_sleep(operation, tokio::time::sleep).await
    }

    /// Same as [`RetryPolicy::retry`] with a caller supplied sleep function.
    ///
    /// Every failed attempt is followed by exactly one sleep, so a bounded
    /// policy with `max_retries = n` sleeps `n` times before returning the
    /// last error.
    pub async fn retry_with_sleep<F, Fut, T, E, S, SFut>(
        &self,
        mut operation: F,
        mut sleep: S,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    sleep(self.delay(attempt)).await;
                    attempt = attempt.saturating_add(1);
                    if let Some(max) = self.max_retries {
                        if attempt >= max {
                            return Err(err);
                        }
                    }
                }
            }
        }
    }
}
