//! Bounded lock retry policy shared by every backing store.
//!
//! Lock waits never block indefinitely. A store probes the lock state up to
//! `max_retries` times, sleeping `retry_interval` between probes, and fails
//! with [`StorageError::LockTimeout`] once the budget is spent.

use crate::error::{StorageError, StorageResult};
use coffer_core::config::LockConfig;
use std::future::Future;
use std::time::Duration;

/// Fixed-interval retry budget for lock waits and acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockPolicy {
    pub max_retries: u32,
    pub retry_interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_interval: Duration::from_millis(100),
        }
    }
}

impl LockPolicy {
    pub fn new(max_retries: u32, retry_interval: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_interval,
        }
    }

    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(config.max_retries, config.retry_interval())
    }

    /// Total time a caller may spend waiting on one lock.
    pub fn budget(&self) -> Duration {
        self.retry_interval.saturating_mul(self.max_retries)
    }

    /// Run `attempt` until it reports success or the budget runs out.
    ///
    /// `attempt` returns `Ok(true)` when done, `Ok(false)` to retry, and any
    /// error aborts immediately.
    pub async fn retry<F, Fut>(&self, store: &str, mut attempt: F) -> StorageResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<bool>>,
    {
        for n in 1..=self.max_retries {
            if attempt().await? {
                return Ok(());
            }
            if n < self.max_retries {
                tokio::time::sleep(self.retry_interval).await;
            }
        }
        Err(self.timeout(store))
    }

    /// Build the timeout error for `store` and log it.
    pub fn timeout(&self, store: &str) -> StorageError {
        tracing::warn!(
            store = %store,
            attempts = self.max_retries,
            "Lock wait exhausted retry budget"
        );
        StorageError::LockTimeout {
            store: store.to_string(),
            attempts: self.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_some_attempts() {
        let policy = LockPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        policy
            .retry("users.json", || async {
                Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_times_out_after_max_retries() {
        let policy = LockPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let err = policy
            .retry("users.json", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            StorageError::LockTimeout { store, attempts } => {
                assert_eq!(store, "users.json");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_propagates_probe_errors() {
        let policy = LockPolicy::default();
        let err = policy
            .retry("users.json", || async {
                Err(StorageError::Config("boom".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_budget_and_zero_retries() {
        assert_eq!(LockPolicy::default().budget(), Duration::from_secs(1));
        assert_eq!(LockPolicy::new(0, Duration::from_millis(5)).max_retries, 1);
    }
}
