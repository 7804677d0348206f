//! Storage ports of the email queue.
//!
//! The queue logic only talks to these traits; `repositories` provides the
//! PostgreSQL implementations and [`crate::jobs::memory`] the in-process ones.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Contact, EmailJob, EmailJobStatus, JobTransition};

/// Durable table of email jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job and return the stored row.
    async fn insert(&self, job: EmailJob) -> AppResult<EmailJob>;

    /// Jobs in `status` with `next_attempt_at_ms <= max_next_attempt_ms`,
    /// oldest `created_at_ms` first, at most `limit` rows.
    async fn find_due(
        &self,
        status: EmailJobStatus,
        max_next_attempt_ms: i64,
        limit: u32,
    ) -> AppResult<Vec<EmailJob>>;

    /// Jobs in `status` whose lock was taken strictly before `locked_before_ms`.
    async fn find_stale(
        &self,
        status: EmailJobStatus,
        locked_before_ms: i64,
    ) -> AppResult<Vec<EmailJob>>;

    /// Apply `transition` only if the row still has `expected_status` and
    /// `expected_version`. Returns whether the row was updated; a successful
    /// update increments `version`.
    async fn conditional_update(
        &self,
        id: &str,
        expected_status: EmailJobStatus,
        expected_version: i64,
        transition: &JobTransition,
    ) -> AppResult<bool>;

    async fn get_by_id(&self, id: &str) -> AppResult<Option<EmailJob>>;
}

/// Read access to the contact messages jobs refer to
#[async_trait]
pub trait ContactLookup: Send + Sync {
    async fn find_contact(&self, id: &str) -> AppResult<Option<Contact>>;
}
