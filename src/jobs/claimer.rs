//! Stale-lock reclaiming and batch claiming.
//!
//! Both operations select candidates first and then move each one with a
//! conditional update, so any number of workers may run them against the
//! same store.

use std::sync::Arc;

use crate::error::AppResult;
use crate::jobs::store::JobStore;
use crate::models::{EmailJob, EmailJobStatus, JobTransition};

#[derive(Clone)]
pub struct JobClaimer {
    store: Arc<dyn JobStore>,
}

impl JobClaimer {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Release every IN_PROGRESS job locked before `now_ms - stale_lock_ms`
    /// back to PENDING, leaving attempts and schedule untouched.
    ///
    /// Returns the number of jobs released. Jobs that changed in between
    /// (finished by their owner, or released by another worker) are skipped.
    pub async fn reclaim_stale(&self, now_ms: i64, stale_lock_ms: u64) -> AppResult<usize> {
        let threshold = i64::try_from(stale_lock_ms).unwrap_or(i64::MAX);
        let locked_before = now_ms.saturating_sub(threshold);

        let stale = self
            .store
            .find_stale(EmailJobStatus::InProgress, locked_before)
            .await?;

        let release = JobTransition::release(now_ms);
        let mut released = 0;
        for job in stale {
            if self
                .store
                .conditional_update(&job.id, EmailJobStatus::InProgress, job.version, &release)
                .await?
            {
                tracing::warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    locked_at_ms = job.locked_at_ms,
                    attempts = job.attempts,
                    "Released stale email job lock"
                );
                released += 1;
            }
        }

        Ok(released)
    }

    /// Claim up to `batch_size` due PENDING jobs, oldest first.
    ///
    /// Only jobs whose conditional update succeeded are returned, already in
    /// their claimed state. A store error after the first successful claim
    /// ends the batch early and returns what was claimed so far, so those
    /// jobs are processed now instead of waiting for the stale-lock reclaim.
    pub async fn claim_batch(&self, now_ms: i64, batch_size: u32) -> AppResult<Vec<EmailJob>> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .find_due(EmailJobStatus::Pending, now_ms, batch_size)
            .await?;

        let claim = JobTransition::claim(now_ms);
        let mut claimed = Vec::with_capacity(candidates.len());
        for mut job in candidates {
            match self
                .store
                .conditional_update(&job.id, EmailJobStatus::Pending, job.version, &claim)
                .await
            {
                Ok(true) => {
                    job.apply(&claim);
                    claimed.push(job);
                }
                Ok(false) => {
                    tracing::debug!(job_id = %job.id, "Email job claimed by another worker");
                }
                Err(e) if claimed.is_empty() => return Err(e),
                Err(e) => {
                    tracing::error!(
                        job_id = %job.id,
                        claimed = claimed.len(),
                        error = %e,
                        "Claiming stopped early, processing the jobs claimed so far"
                    );
                    break;
                }
            }
        }

        Ok(claimed)
    }
}
