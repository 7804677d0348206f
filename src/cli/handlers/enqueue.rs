//! Enqueue command handler
//!
//! Creates the contact email jobs for a contact row that already exists,
//! e.g. to replay a submission whose jobs were never written.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::ContactConfig;
use crate::config::settings::Settings;
use crate::db::establish_async_connection_pool;
use crate::error::{AppError, AppResult};
use crate::jobs::{Clock, ContactLookup, EmailQueueService, JobStore, SystemClock};
use crate::models::EmailJobType;
use crate::repositories::Repositories;

/// Handler for the enqueue command
pub struct EnqueueCommandHandler {
    config: Settings,
}

impl EnqueueCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Enqueue the enabled contact emails for `contact_id`.
    ///
    /// # Errors
    /// - `AppError::Validation` when the flags leave no email type enabled
    /// - `AppError::NotFound` when the contact does not exist
    /// - `AppError::Internal` when none of the jobs could be written
    pub async fn execute(&self, contact_id: &str, no_owner: bool, no_reply: bool) -> AppResult<()> {
        let variants = requested_variants(&self.config.contact, no_owner, no_reply);
        if variants.is_empty() {
            return Err(AppError::Validation {
                field: "contact".to_string(),
                reason: "No contact email type is enabled for this request".to_string(),
            });
        }

        let pool = establish_async_connection_pool(&self.config.database).await?;
        let repos = Repositories::new(pool);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let created = enqueue_for_contact(
            Arc::new(repos.email_jobs),
            &repos.contacts,
            clock,
            contact_id,
            &variants,
        )
        .await?;

        println!("Enqueued {} email job(s) for contact {}:", created.len(), contact_id);
        for id in &created {
            println!("  - {}", id);
        }
        if created.len() < variants.len() {
            println!("Warning: some jobs could not be written, see the log for details");
        }

        Ok(())
    }
}

/// Enabled contact variants narrowed by the `--no-owner` / `--no-reply` flags
pub fn requested_variants(
    contact: &ContactConfig,
    no_owner: bool,
    no_reply: bool,
) -> BTreeSet<EmailJobType> {
    let mut variants = contact.enabled_variants();
    if no_owner {
        variants.remove(&EmailJobType::ContactNotifyOwner);
    }
    if no_reply {
        variants.remove(&EmailJobType::ContactReplySender);
    }
    variants
}

/// Checks the contact exists, then writes one job per variant.
pub async fn enqueue_for_contact(
    store: Arc<dyn JobStore>,
    contacts: &dyn ContactLookup,
    clock: Arc<dyn Clock>,
    contact_id: &str,
    variants: &BTreeSet<EmailJobType>,
) -> AppResult<Vec<String>> {
    if contacts.find_contact(contact_id).await?.is_none() {
        return Err(AppError::NotFound {
            entity: "contact".to_string(),
            field: "id".to_string(),
            value: contact_id.to_string(),
        });
    }

    let service = EmailQueueService::new(store, clock, variants.clone());
    let created = service.enqueue_contact_emails(contact_id, variants).await;

    if created.is_empty() {
        return Err(AppError::Internal {
            source: anyhow::anyhow!("No email job could be written for contact {}", contact_id),
        });
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{ManualClock, MemoryContacts, MemoryJobStore};
    use crate::models::{Contact, EmailJobStatus};

    fn contact_config(owner: &str, reply: bool) -> ContactConfig {
        ContactConfig {
            notification_email: owner.to_string(),
            send_reply_to_sender: reply,
        }
    }

    #[test]
    fn test_requested_variants_follow_config_and_flags() {
        let config = contact_config("owner@example.com", true);
        assert_eq!(requested_variants(&config, false, false).len(), 2);
        assert_eq!(
            requested_variants(&config, true, false),
            BTreeSet::from([EmailJobType::ContactReplySender])
        );
        assert_eq!(
            requested_variants(&config, false, true),
            BTreeSet::from([EmailJobType::ContactNotifyOwner])
        );

        // Flags never enable a variant the configuration turned off
        let config = contact_config("", false);
        assert!(requested_variants(&config, false, false).is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_for_existing_contact() {
        let store = Arc::new(MemoryJobStore::new());
        let contacts = MemoryContacts::new();
        contacts.insert(Contact {
            id: "c-7".to_string(),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            message: "Hello".to_string(),
            created_at_ms: 0,
        });
        let clock = Arc::new(ManualClock::new(5_000));
        let variants = BTreeSet::from([
            EmailJobType::ContactNotifyOwner,
            EmailJobType::ContactReplySender,
        ]);

        let ids = enqueue_for_contact(store.clone(), &contacts, clock, "c-7", &variants)
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        let jobs = store.all();
        assert!(jobs.iter().all(|j| j.status == EmailJobStatus::Pending
            && j.reference_id.as_deref() == Some("c-7")
            && j.next_attempt_at_ms == 5_000));
    }

    #[tokio::test]
    async fn test_enqueue_for_missing_contact() {
        let store = Arc::new(MemoryJobStore::new());
        let contacts = MemoryContacts::new();
        let clock = Arc::new(ManualClock::new(0));
        let variants = BTreeSet::from([EmailJobType::ContactReplySender]);

        let result = enqueue_for_contact(store.clone(), &contacts, clock, "ghost", &variants).await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
        assert!(store.is_empty());
    }
}
