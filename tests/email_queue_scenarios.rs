//! End-to-end queue behaviour against the in-process store and a manual clock.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use mailer_rs::config::EmailQueueConfig;
use mailer_rs::error::{AppError, AppResult};
use mailer_rs::jobs::{
    Clock, EmailQueueService, EmailQueueWorker, JobClaimer, JobProcessor, JobStore, ManualClock,
    MemoryContacts, MemoryJobStore, QueueEvent, RetryPolicy,
};
use mailer_rs::models::{Contact, EmailJob, EmailJobStatus, EmailJobType};
use mailer_rs::services::delivery::{DeliveryCallback, DeliveryRegistry};

const START_MS: i64 = 1_700_000_000_000;

/// Fails the first `failures` calls, then succeeds
struct ScriptedCallback {
    failures: usize,
    calls: AtomicUsize,
}

impl ScriptedCallback {
    fn failing_first(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryCallback for ScriptedCallback {
    async fn send(&self, _contact: &Contact) -> AppResult<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            // Alternate between the two failure shapes a callback can report
            if call % 2 == 0 {
                return Ok(false);
            }
            return Err(AppError::delivery("scripted", "HTTP 503"));
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct Harness {
    store: Arc<MemoryJobStore>,
    clock: Arc<ManualClock>,
    config: EmailQueueConfig,
    worker: EmailQueueWorker,
}

impl Harness {
    fn new(callback: Arc<ScriptedCallback>) -> Self {
        Self::with_config(callback, EmailQueueConfig::default())
    }

    fn with_config(callback: Arc<ScriptedCallback>, config: EmailQueueConfig) -> Self {
        let store = Arc::new(MemoryJobStore::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let contacts = Arc::new(MemoryContacts::new());
        contacts.insert(Contact {
            id: "contact-1".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            message: "Hello there".to_string(),
            created_at_ms: START_MS,
        });

        let registry = DeliveryRegistry::new()
            .with(EmailJobType::ContactNotifyOwner, callback.clone())
            .with(EmailJobType::ContactReplySender, callback);
        let processor = JobProcessor::new(
            store.clone(),
            contacts,
            registry,
            RetryPolicy::from(&config),
            clock.clone(),
        );
        let worker = EmailQueueWorker::new(
            config.clone(),
            JobClaimer::new(store.clone()),
            processor,
            clock.clone(),
        );

        Self {
            store,
            clock,
            config,
            worker,
        }
    }

    async fn enqueue(&self, job_type: EmailJobType, reference: &str) -> EmailJob {
        self.store
            .insert(EmailJob::new_pending(
                job_type,
                Some(reference.to_string()),
                self.clock.now_ms(),
            ))
            .await
            .unwrap()
    }

    async fn job(&self, id: &str) -> EmailJob {
        self.store.get_by_id(id).await.unwrap().unwrap()
    }

    fn assert_invariants(&self) {
        for job in self.store.all() {
            assert_eq!(
                job.status == EmailJobStatus::InProgress,
                job.locked_at_ms.is_some(),
                "lock invariant broken for {job:?}"
            );
        }
    }
}

#[tokio::test]
async fn scenario_a_first_attempt_succeeds() {
    let callback = ScriptedCallback::failing_first(0);
    let h = Harness::new(callback.clone());
    let job = h.enqueue(EmailJobType::ContactNotifyOwner, "contact-1").await;

    let report = h.worker.tick().await.unwrap();

    assert_eq!(report.sent, 1);
    let job = h.job(&job.id).await;
    assert_eq!(job.status, EmailJobStatus::Sent);
    assert_eq!(job.attempts, 0);
    assert!(job.last_error.is_none());
    assert_eq!(callback.calls(), 1);
    h.assert_invariants();
}

#[tokio::test]
async fn scenario_b_three_failures_then_success() {
    let callback = ScriptedCallback::failing_first(3);
    let h = Harness::new(callback.clone());
    let job = h.enqueue(EmailJobType::ContactReplySender, "contact-1").await;

    let mut previous_attempts = 0;
    for expected_delay in [1_000, 2_000, 4_000] {
        let failed_at = h.clock.now_ms();
        let report = h.worker.tick().await.unwrap();
        assert_eq!(report.retried, 1);

        let current = h.job(&job.id).await;
        assert_eq!(current.status, EmailJobStatus::Pending);
        assert_eq!(current.next_attempt_at_ms, failed_at + expected_delay);
        assert!(current.attempts > previous_attempts);
        assert!(current.last_error.is_some());
        previous_attempts = current.attempts;
        h.assert_invariants();

        // Not due until the backoff has elapsed
        h.clock.set(current.next_attempt_at_ms - 1);
        assert!(h.worker.tick().await.unwrap().is_idle());
        h.clock.set(current.next_attempt_at_ms);
    }

    let report = h.worker.tick().await.unwrap();
    assert_eq!(report.sent, 1);

    let job = h.job(&job.id).await;
    assert_eq!(job.status, EmailJobStatus::Sent);
    assert_eq!(job.attempts, 3);
    assert_eq!(callback.calls(), 4);
    h.assert_invariants();
}

#[tokio::test]
async fn scenario_c_exhausted_retries_end_failed() {
    let callback = ScriptedCallback::failing_first(usize::MAX);
    let h = Harness::new(callback.clone());
    assert_eq!(h.config.max_attempts, 8);
    let job = h.enqueue(EmailJobType::ContactNotifyOwner, "contact-1").await;

    for _ in 0..8 {
        let report = h.worker.tick().await.unwrap();
        assert_eq!(report.claimed, 1);
        let current = h.job(&job.id).await;
        h.clock.set(current.next_attempt_at_ms);
    }

    let job = h.job(&job.id).await;
    assert_eq!(job.status, EmailJobStatus::Failed);
    assert_eq!(job.attempts, 8);
    assert!(job.locked_at_ms.is_none());
    assert!(job.last_error.is_some());
    assert_eq!(callback.calls(), 8);

    // Terminal: later ticks never pick it up again
    h.clock.advance(3_600_000);
    assert!(h.worker.tick().await.unwrap().is_idle());
    assert_eq!(callback.calls(), 8);
}

#[tokio::test]
async fn scenario_d_stale_lock_is_reclaimed_without_penalty() {
    let h = Harness::new(ScriptedCallback::failing_first(0));
    let job = h.enqueue(EmailJobType::ContactReplySender, "contact-1").await;
    let claimer = JobClaimer::new(h.store.clone());

    // A worker claims the job and dies before recording an outcome
    let claimed = claimer.claim_batch(h.clock.now_ms(), 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, EmailJobStatus::InProgress);

    // Exactly at the threshold the lock is still considered alive
    h.clock.advance(h.config.stale_lock_ms as i64);
    assert_eq!(
        claimer
            .reclaim_stale(h.clock.now_ms(), h.config.stale_lock_ms)
            .await
            .unwrap(),
        0
    );

    h.clock.advance(1);
    assert_eq!(
        claimer
            .reclaim_stale(h.clock.now_ms(), h.config.stale_lock_ms)
            .await
            .unwrap(),
        1
    );

    let released = h.job(&job.id).await;
    assert_eq!(released.status, EmailJobStatus::Pending);
    assert_eq!(released.attempts, 0);
    assert_eq!(released.next_attempt_at_ms, job.next_attempt_at_ms);
    assert!(released.locked_at_ms.is_none());
    h.assert_invariants();

    let reclaimed = claimer.claim_batch(h.clock.now_ms(), 10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, job.id);
}

#[tokio::test]
async fn scenario_e_unresolvable_reference_fails_permanently() {
    let callback = ScriptedCallback::failing_first(0);
    let h = Harness::new(callback.clone());
    let job = h.enqueue(EmailJobType::ContactNotifyOwner, "deleted-contact").await;

    let report = h.worker.tick().await.unwrap();
    assert_eq!(report.failed, 1);

    let failed = h.job(&job.id).await;
    assert_eq!(failed.status, EmailJobStatus::Failed);
    assert_eq!(failed.attempts, 8);
    assert_eq!(failed.next_attempt_at_ms, job.next_attempt_at_ms);
    assert!(failed.last_error.unwrap().contains("deleted-contact"));
    assert_eq!(callback.calls(), 0);
    h.assert_invariants();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_return_the_same_job() {
    let store = Arc::new(MemoryJobStore::new());
    for i in 0..200 {
        store
            .insert(EmailJob::new_pending(
                EmailJobType::ContactReplySender,
                Some(format!("contact-{i}")),
                START_MS + i,
            ))
            .await
            .unwrap();
    }

    let now = START_MS + 1_000;
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let claimer = JobClaimer::new(store.clone());
            tokio::spawn(async move { claimer.claim_batch(now, 200).await.unwrap() })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for job in handle.await.unwrap() {
            assert!(seen.insert(job.id.clone()), "job {} claimed twice", job.id);
        }
    }

    // Every job was a candidate for every claimer, so each has exactly one winner
    assert_eq!(seen.len(), 200);
    assert!(
        store
            .all()
            .iter()
            .all(|j| j.status == EmailJobStatus::InProgress && j.version == 1)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn workers_sharing_a_store_deliver_each_job_once() {
    let callback = ScriptedCallback::failing_first(0);
    let config = EmailQueueConfig {
        batch_size: 5,
        concurrency: 3,
        ..EmailQueueConfig::default()
    };
    let first = Harness::with_config(callback.clone(), config.clone());

    // Second worker on the same store and clock
    let contacts = Arc::new(MemoryContacts::new());
    contacts.insert(Contact {
        id: "contact-1".to_string(),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        message: "Hello there".to_string(),
        created_at_ms: START_MS,
    });
    let second = EmailQueueWorker::new(
        config.clone(),
        JobClaimer::new(first.store.clone()),
        JobProcessor::new(
            first.store.clone(),
            contacts,
            DeliveryRegistry::new().with(EmailJobType::ContactReplySender, callback.clone()),
            RetryPolicy::from(&config),
            first.clock.clone(),
        ),
        first.clock.clone(),
    );

    let service = EmailQueueService::new(
        first.store.clone(),
        first.clock.clone(),
        [EmailJobType::ContactReplySender].into_iter().collect(),
    );
    for _ in 0..20 {
        let ids = service
            .enqueue(QueueEvent::ContactSubmitted {
                contact_id: "contact-1".to_string(),
            })
            .await;
        assert_eq!(ids.len(), 1);
    }

    loop {
        let (a, b) = tokio::join!(first.worker.tick(), second.tick());
        let (a, b) = (a.unwrap(), b.unwrap());
        if a.is_idle() && b.is_idle() {
            break;
        }
    }

    assert_eq!(callback.calls(), 20);
    assert!(
        first
            .store
            .all()
            .iter()
            .all(|j| j.status == EmailJobStatus::Sent)
    );
    first.assert_invariants();
}
