//! Periodic removal of expired sessions and CSRF tokens.

use crate::error::ServiceResult;
use coffer_metadata::{CsrfRepo, SessionRepo};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Counts from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    pub sessions_removed: usize,
    pub csrf_removed: usize,
}

#[derive(Clone)]
pub struct Maintenance {
    sessions: Arc<dyn SessionRepo>,
    csrf: Arc<dyn CsrfRepo>,
}

impl Maintenance {
    pub fn new(sessions: Arc<dyn SessionRepo>, csrf: Arc<dyn CsrfRepo>) -> Self {
        Self { sessions, csrf }
    }

    pub async fn sweep(&self) -> ServiceResult<SweepReport> {
        self.sweep_at(coffer_core::unix_now()).await
    }

    /// Clean both stores as of `now`. The stores are cleaned independently:
    /// a failure in one does not undo the other.
    pub async fn sweep_at(&self, now: i64) -> ServiceResult<SweepReport> {
        let sessions_removed = self.sessions.clean_up_at(now).await?;
        let csrf_removed = self.csrf.clean_up_at(now).await?;
        Ok(SweepReport {
            sessions_removed,
            csrf_removed,
        })
    }

    /// Sweep every `interval` until the task is aborted. Failures are
    /// logged and retried on the next tick.
    pub fn spawn(self, interval: Duration, on_sweep: fn(&SweepReport)) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(report) => {
                        on_sweep(&report);
                        if report.sessions_removed + report.csrf_removed > 0 {
                            tracing::info!(
                                sessions_removed = report.sessions_removed,
                                csrf_removed = report.csrf_removed,
                                "maintenance sweep"
                            );
                        }
                    }
                    Err(e) if e.is_lock_timeout() => {
                        tracing::warn!(error = %e, "maintenance sweep skipped: store busy");
                    }
                    Err(e) => tracing::error!(error = %e, "maintenance sweep failed"),
                }
            }
        })
    }
}
