//! Turns domain events into email jobs.
//!
//! Enqueueing only writes to the job store. It never fails the caller: a
//! store error is logged and the ids of the jobs already written are returned.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::jobs::clock::Clock;
use crate::jobs::store::JobStore;
use crate::models::{EmailJob, EmailJobType};

/// Events that produce email jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A visitor submitted the contact form
    ContactSubmitted { contact_id: String },
}

#[derive(Clone)]
pub struct EmailQueueService {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    contact_variants: BTreeSet<EmailJobType>,
}

impl EmailQueueService {
    /// `contact_variants` are the job types created per contact submission.
    pub fn new(
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        contact_variants: BTreeSet<EmailJobType>,
    ) -> Self {
        Self {
            store,
            clock,
            contact_variants,
        }
    }

    /// Enqueue the jobs for `event`, returning the ids of the created jobs.
    pub async fn enqueue(&self, event: QueueEvent) -> Vec<String> {
        match event {
            QueueEvent::ContactSubmitted { contact_id } => {
                self.enqueue_contact_emails(&contact_id, &self.contact_variants)
                    .await
            }
        }
    }

    /// Create one PENDING job per enabled variant for the contact `reference_id`.
    pub async fn enqueue_contact_emails(
        &self,
        reference_id: &str,
        variants_enabled: &BTreeSet<EmailJobType>,
    ) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut created = Vec::with_capacity(variants_enabled.len());

        for &job_type in variants_enabled {
            let job = EmailJob::new_pending(job_type, Some(reference_id.to_string()), now);
            match self.store.insert(job).await {
                Ok(job) => {
                    tracing::info!(
                        job_id = %job.id,
                        job_type = %job_type,
                        contact_id = reference_id,
                        "Email job enqueued"
                    );
                    created.push(job.id);
                }
                Err(e) => {
                    tracing::error!(
                        job_type = %job_type,
                        contact_id = reference_id,
                        error = %e,
                        "Failed to enqueue email job"
                    );
                }
            }
        }

        created
    }
}
