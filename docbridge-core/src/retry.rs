//! Bounded retry with exponential backoff for store operations.
//!
//! The [`ResilientExecutor`] re-runs an operation only when it fails with a
//! [`DocumentStoreError::Transient`] error. With the default policy it makes up
//! to 3 retries (4 attempts), waiting `2^k` seconds before retry `k`, with no
//! jitter. Any other failure, and the last transient one, is returned as-is.
//!
//! Cancellation is checked before every attempt and raced against both the
//! in-flight operation and the backoff sleep. A cancelled invocation returns
//! [`DocumentStoreError::Cancelled`] without consuming a retry.

use std::{future::Future, time::Duration};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Retry settings for one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit; the wait before retry `k` is `base_delay * multiplier^k`.
    pub base_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(retry))
    }
}

/// Serializable form of [`RetryPolicy`] used in configuration files.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();

        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            ..Self::default()
        }
    }
}

/// Runs store operations under a [`RetryPolicy`] and a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct ResilientExecutor {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl ResilientExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a copy of this executor observing `token`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            policy: self.policy.clone(),
            cancel: token,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `op` until it succeeds, fails permanently or exhausts the policy.
    ///
    /// `op` is invoked once per attempt and must build a fresh future each time.
    /// `operation` names the call in log events.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> DocumentStoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DocumentStoreResult<T>>,
    {
        let mut retry = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(DocumentStoreError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DocumentStoreError::Cancelled),
                result = op() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry < self.policy.max_retries => err,
                Err(err) => {
                    if err.is_transient() {
                        error!(operation, attempts = retry + 1, error = %err, "store operation failed after exhausting retries");
                    }
                    return Err(err);
                }
            };

            retry += 1;
            let delay = self.policy.delay_for(retry);

            warn!(
                operation,
                retry,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient store failure, backing off",
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DocumentStoreError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
