//! Core delivery traits and the job-type lookup table.
//!
//! Two seams live here: an [`EmailProvider`] moves a rendered message over
//! the wire, and a [`DeliveryCallback`] turns a contact into exactly one send
//! for one job type. The queue only ever sees callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{Contact, EmailJobType};

/// A rendered email ready to be handed to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Lets the provider drop duplicates when a retried send already went out
    pub idempotency_key: Option<String>,
}

/// Transport for outbound email (HTTP API, SMTP, ...)
///
/// # Example Implementation
/// ```ignore
/// #[async_trait]
/// impl EmailProvider for ResendProvider {
///     async fn send(&self, message: &EmailMessage) -> AppResult<bool> {
///         // POST the message, report whether the API accepted it
///     }
///
///     fn name(&self) -> &'static str {
///         "resend"
///     }
/// }
/// ```
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Attempts one send.
    ///
    /// # Returns
    /// `Ok(true)` when the provider accepted the message, `Ok(false)` when it
    /// refused it, `Err` for failures the provider could not classify.
    async fn send(&self, message: &EmailMessage) -> AppResult<bool>;

    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Opens a connection ahead of the first real send (optional, default no-op)
    async fn warm_up(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Sends the email of one job type for a contact.
///
/// Implementations attempt a single send and never retry on their own;
/// retries belong to the queue.
#[async_trait]
pub trait DeliveryCallback: Send + Sync {
    /// `Ok(true)` on success (including "nothing to send"), `Ok(false)` or
    /// `Err` on a failure the queue should retry.
    async fn send(&self, contact: &Contact) -> AppResult<bool>;

    fn name(&self) -> &'static str;
}

/// Lookup table from job type to its delivery callback
#[derive(Clone, Default)]
pub struct DeliveryRegistry {
    callbacks: HashMap<EmailJobType, Arc<dyn DeliveryCallback>>,
}

impl DeliveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `job_type`, replacing any previous one.
    pub fn register(&mut self, job_type: EmailJobType, callback: Arc<dyn DeliveryCallback>) {
        if let Some(previous) = self.callbacks.insert(job_type, callback) {
            tracing::debug!(
                job_type = %job_type,
                replaced = previous.name(),
                "Replaced delivery callback"
            );
        }
    }

    pub fn with(mut self, job_type: EmailJobType, callback: Arc<dyn DeliveryCallback>) -> Self {
        self.register(job_type, callback);
        self
    }

    pub fn get(&self, job_type: EmailJobType) -> Option<Arc<dyn DeliveryCallback>> {
        self.callbacks.get(&job_type).cloned()
    }
}

impl std::fmt::Debug for DeliveryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (job_type, callback) in &self.callbacks {
            map.entry(&job_type.as_str(), &callback.name());
        }
        map.finish()
    }
}
