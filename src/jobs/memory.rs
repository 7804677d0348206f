//! In-process job and contact stores backed by `DashMap`.
//!
//! Conditional updates hold the entry's shard lock for the whole
//! compare-and-apply, which gives the same single-winner guarantee as the
//! guarded `UPDATE` of the PostgreSQL store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{AppError, AppResult};
use crate::jobs::store::{ContactLookup, JobStore};
use crate::models::{Contact, EmailJob, EmailJobStatus, JobTransition};

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<String, EmailJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshot of every job, oldest first.
    pub fn all(&self) -> Vec<EmailJob> {
        let mut jobs: Vec<EmailJob> = self.jobs.iter().map(|e| e.value().clone()).collect();
        sort_oldest_first(&mut jobs);
        jobs
    }
}

fn sort_oldest_first(jobs: &mut [EmailJob]) {
    jobs.sort_by(|a, b| {
        a.created_at_ms
            .cmp(&b.created_at_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: EmailJob) -> AppResult<EmailJob> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Validation {
                field: "id".to_string(),
                reason: format!("Duplicate entry: {}", job.id),
            }),
            Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(job)
            }
        }
    }

    async fn find_due(
        &self,
        status: EmailJobStatus,
        max_next_attempt_ms: i64,
        limit: u32,
    ) -> AppResult<Vec<EmailJob>> {
        let mut due: Vec<EmailJob> = self
            .jobs
            .iter()
            .filter(|e| e.status == status && e.scheduled_by(max_next_attempt_ms))
            .map(|e| e.value().clone())
            .collect();
        sort_oldest_first(&mut due);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn find_stale(
        &self,
        status: EmailJobStatus,
        locked_before_ms: i64,
    ) -> AppResult<Vec<EmailJob>> {
        let mut stale: Vec<EmailJob> = self
            .jobs
            .iter()
            .filter(|e| e.status == status && e.locked_before(locked_before_ms))
            .map(|e| e.value().clone())
            .collect();
        sort_oldest_first(&mut stale);
        Ok(stale)
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_status: EmailJobStatus,
        expected_version: i64,
        transition: &JobTransition,
    ) -> AppResult<bool> {
        let Some(mut job) = self.jobs.get_mut(id) else {
            return Ok(false);
        };
        if job.status != expected_status || job.version != expected_version {
            return Ok(false);
        }
        job.apply(transition);
        Ok(true)
    }

    async fn get_by_id(&self, id: &str) -> AppResult<Option<EmailJob>> {
        Ok(self.jobs.get(id).map(|e| e.value().clone()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryContacts {
    contacts: DashMap<String, Contact>,
}

impl MemoryContacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }

    pub fn remove(&self, id: &str) -> Option<Contact> {
        self.contacts.remove(id).map(|(_, contact)| contact)
    }
}

#[async_trait]
impl ContactLookup for MemoryContacts {
    async fn find_contact(&self, id: &str) -> AppResult<Option<Contact>> {
        Ok(self.contacts.get(id).map(|e| e.value().clone()))
    }
}
