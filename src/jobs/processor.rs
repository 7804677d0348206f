//! Runs one delivery attempt for a claimed job and records the outcome.
//!
//! Every write re-reads the job first and goes through a conditional update
//! guarded by the claimed version, so a job that was reclaimed while its
//! callback ran is never overwritten.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{AppError, AppResult};
use crate::jobs::backoff::RetryPolicy;
use crate::jobs::clock::Clock;
use crate::jobs::store::{ContactLookup, JobStore};
use crate::models::{EmailJob, EmailJobStatus, JobTransition};
use crate::services::delivery::DeliveryRegistry;

/// What happened to a job after one processing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Sent,
    /// Scheduled again after a transient failure
    Retried { attempts: i32, next_attempt_at_ms: i64 },
    /// Dead-lettered, either permanently or after exhausting retries
    Failed { attempts: i32 },
    /// The job changed under us (reclaimed or finished elsewhere); nothing written
    Skipped,
}

/// Result of invoking a delivery callback
enum Attempt {
    Delivered,
    Transient(String),
    Permanent(String),
}

#[derive(Clone)]
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    contacts: Arc<dyn ContactLookup>,
    registry: DeliveryRegistry,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        contacts: Arc<dyn ContactLookup>,
        registry: DeliveryRegistry,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            contacts,
            registry,
            policy,
            clock,
        }
    }

    /// Process a job previously returned by the claimer.
    ///
    /// Delivery failures never surface as `Err`; they become a retry or a
    /// failure transition. `Err` means the store itself could not be used.
    #[tracing::instrument(
        name = "email_job",
        skip_all,
        fields(job_id = %job.id, job_type = %job.job_type, attempt = job.attempts + 1)
    )]
    pub async fn process(&self, job: &EmailJob) -> AppResult<ProcessOutcome> {
        if job.status != EmailJobStatus::InProgress {
            tracing::warn!(status = %job.status, "Job is not claimed, skipping");
            return Ok(ProcessOutcome::Skipped);
        }

        let started = Instant::now();
        let attempt = self.attempt(job).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match attempt {
            Attempt::Delivered => {
                let now = self.clock.now_ms();
                if !self.finish(job, &JobTransition::sent(now)).await? {
                    return Ok(ProcessOutcome::Skipped);
                }
                tracing::info!(duration_ms, "Email job sent");
                Ok(ProcessOutcome::Sent)
            }
            Attempt::Permanent(reason) => {
                let attempts = job.attempts.max(self.policy.max_attempts_i32());
                let now = self.clock.now_ms();
                if !self
                    .finish(job, &JobTransition::fail(attempts, &reason, now))
                    .await?
                {
                    return Ok(ProcessOutcome::Skipped);
                }
                tracing::error!(duration_ms, attempts, reason = %reason, "Email job failed permanently");
                Ok(ProcessOutcome::Failed { attempts })
            }
            Attempt::Transient(reason) => {
                let attempts = job.attempts.saturating_add(1);
                let now = self.clock.now_ms();

                if self.policy.is_exhausted(attempts) {
                    if !self
                        .finish(job, &JobTransition::fail(attempts, &reason, now))
                        .await?
                    {
                        return Ok(ProcessOutcome::Skipped);
                    }
                    tracing::error!(
                        duration_ms,
                        attempts,
                        reason = %reason,
                        "Email job exhausted its retries"
                    );
                    return Ok(ProcessOutcome::Failed { attempts });
                }

                let backoff_ms = self.policy.delay_ms(attempts);
                let next_attempt_at_ms =
                    now.saturating_add(i64::try_from(backoff_ms).unwrap_or(i64::MAX));
                if !self
                    .finish(
                        job,
                        &JobTransition::retry(attempts, next_attempt_at_ms, &reason, now),
                    )
                    .await?
                {
                    return Ok(ProcessOutcome::Skipped);
                }
                tracing::warn!(
                    duration_ms,
                    attempts,
                    backoff_ms,
                    reason = %reason,
                    "Email job will be retried"
                );
                Ok(ProcessOutcome::Retried {
                    attempts,
                    next_attempt_at_ms,
                })
            }
        }
    }

    async fn attempt(&self, job: &EmailJob) -> Attempt {
        let Some(reference) = job.reference() else {
            return Attempt::Permanent("Job has no contact reference".to_string());
        };

        let contact = match self.contacts.find_contact(reference).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                return Attempt::Permanent(format!("Contact {} not found", reference));
            }
            // The reference may still resolve once the store is back
            Err(e) => return Attempt::Transient(format!("Contact lookup failed: {}", e)),
        };

        let Some(callback) = self.registry.get(job.job_type) else {
            return Attempt::Permanent(format!(
                "No delivery callback registered for {}",
                job.job_type
            ));
        };

        match callback.send(&contact).await {
            Ok(true) => Attempt::Delivered,
            Ok(false) => Attempt::Transient(format!("{} reported a failed send", callback.name())),
            Err(e) => Attempt::Transient(e.to_string()),
        }
    }

    /// Write `transition` if the job is still held by this claim.
    ///
    /// Returns `false` when the race was lost; that is logged, not an error.
    async fn finish(&self, claimed: &EmailJob, transition: &JobTransition) -> AppResult<bool> {
        let current = self
            .store
            .get_by_id(&claimed.id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                entity: "EmailJob".to_string(),
                field: "id".to_string(),
                value: claimed.id.clone(),
            })?;

        let still_ours = current.status == EmailJobStatus::InProgress
            && current.version == claimed.version
            && current.locked_at_ms == claimed.locked_at_ms;
        if !still_ours {
            tracing::warn!(
                current_status = %current.status,
                current_version = current.version,
                claimed_version = claimed.version,
                "Job changed while being processed, dropping result"
            );
            return Ok(false);
        }

        let updated = self
            .store
            .conditional_update(
                &claimed.id,
                EmailJobStatus::InProgress,
                claimed.version,
                transition,
            )
            .await?;
        if !updated {
            tracing::warn!("Lost the race writing the job outcome, dropping result");
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::claimer::JobClaimer;
    use crate::jobs::clock::ManualClock;
    use crate::jobs::memory::{MemoryContacts, MemoryJobStore};
    use crate::models::{Contact, EmailJobType};
    use crate::services::delivery::DeliveryCallback;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails `failures` times, then succeeds
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DeliveryCallback for Flaky {
        async fn send(&self, _contact: &Contact) -> AppResult<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(call >= self.failures)
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    struct Harness {
        store: Arc<MemoryJobStore>,
        contacts: Arc<MemoryContacts>,
        clock: Arc<ManualClock>,
        claimer: JobClaimer,
        processor: JobProcessor,
        callback: Arc<Flaky>,
    }

    fn harness(failures: usize) -> Harness {
        let store = Arc::new(MemoryJobStore::new());
        let contacts = Arc::new(MemoryContacts::new());
        contacts.insert(Contact {
            id: "c-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            message: "Hi".to_string(),
            created_at_ms: 0,
        });
        let clock = Arc::new(ManualClock::new(1_000));
        let callback = Arc::new(Flaky {
            failures,
            calls: AtomicUsize::new(0),
        });
        let registry =
            DeliveryRegistry::new().with(EmailJobType::ContactNotifyOwner, callback.clone());
        let processor = JobProcessor::new(
            store.clone(),
            contacts.clone(),
            registry,
            RetryPolicy::default(),
            clock.clone(),
        );
        Harness {
            claimer: JobClaimer::new(store.clone()),
            store,
            contacts,
            clock,
            processor,
            callback,
        }
    }

    async fn claim_one(h: &Harness, job_type: EmailJobType, reference: Option<&str>) -> EmailJob {
        h.store
            .insert(EmailJob::new_pending(
                job_type,
                reference.map(str::to_string),
                h.clock.now_ms(),
            ))
            .await
            .unwrap();
        h.claimer
            .claim_batch(h.clock.now_ms(), 1)
            .await
            .unwrap()
            .pop()
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_marks_sent() {
        let h = harness(0);
        let job = claim_one(&h, EmailJobType::ContactNotifyOwner, Some("c-1")).await;

        assert_eq!(h.processor.process(&job).await.unwrap(), ProcessOutcome::Sent);

        let stored = h.store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailJobStatus::Sent);
        assert_eq!(stored.attempts, 0);
        assert_eq!(stored.locked_at_ms, None);
    }

    #[tokio::test]
    async fn test_failure_schedules_backoff() {
        let h = harness(1);
        let job = claim_one(&h, EmailJobType::ContactNotifyOwner, Some("c-1")).await;

        let outcome = h.processor.process(&job).await.unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Retried {
                attempts: 1,
                next_attempt_at_ms: 2_000
            }
        );

        let stored = h.store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailJobStatus::Pending);
        assert_eq!(stored.locked_at_ms, None);
        assert_eq!(stored.last_error.as_deref(), Some("flaky reported a failed send"));
    }

    #[tokio::test]
    async fn test_missing_reference_fails_permanently() {
        let h = harness(0);
        let job = claim_one(&h, EmailJobType::ContactNotifyOwner, Some("  ")).await;

        assert_eq!(
            h.processor.process(&job).await.unwrap(),
            ProcessOutcome::Failed { attempts: 8 }
        );
        assert_eq!(h.callback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deleted_contact_fails_permanently() {
        let h = harness(0);
        h.contacts.remove("c-1");
        let job = claim_one(&h, EmailJobType::ContactNotifyOwner, Some("c-1")).await;

        assert_eq!(
            h.processor.process(&job).await.unwrap(),
            ProcessOutcome::Failed { attempts: 8 }
        );
        let stored = h.store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.last_error.as_deref(), Some("Contact c-1 not found"));
    }

    #[tokio::test]
    async fn test_unregistered_type_fails_permanently() {
        let h = harness(0);
        let job = claim_one(&h, EmailJobType::ContactReplySender, Some("c-1")).await;

        assert_eq!(
            h.processor.process(&job).await.unwrap(),
            ProcessOutcome::Failed { attempts: 8 }
        );
    }

    #[tokio::test]
    async fn test_reclaimed_job_result_is_dropped() {
        let h = harness(0);
        let job = claim_one(&h, EmailJobType::ContactNotifyOwner, Some("c-1")).await;

        // Another worker reclaims and re-claims the job meanwhile
        h.clock.advance(400_000);
        h.claimer.reclaim_stale(h.clock.now_ms(), 300_000).await.unwrap();
        let reclaimed = h.claimer.claim_batch(h.clock.now_ms(), 1).await.unwrap();
        assert_eq!(reclaimed.len(), 1);

        assert_eq!(h.processor.process(&job).await.unwrap(), ProcessOutcome::Skipped);
        let stored = h.store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailJobStatus::InProgress);
        assert_eq!(stored.version, reclaimed[0].version);
    }

    #[tokio::test]
    async fn test_unclaimed_job_is_skipped() {
        let h = harness(0);
        let job = EmailJob::new_pending(EmailJobType::ContactNotifyOwner, Some("c-1".into()), 0);
        assert_eq!(h.processor.process(&job).await.unwrap(), ProcessOutcome::Skipped);
        assert_eq!(h.callback.calls.load(Ordering::SeqCst), 0);
    }
}
