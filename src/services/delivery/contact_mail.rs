//! Delivery callbacks of the two contact email types.
//!
//! Neither callback logs contact data; only ids, provider names and timings.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::provider::{DeliveryCallback, DeliveryRegistry, EmailMessage, EmailProvider};
use super::templates;
use crate::config::ContactConfig;
use crate::error::AppResult;
use crate::models::{Contact, EmailJobType};

/// Sender used when none is configured
pub const DEFAULT_FROM: &str = "Portfolio <onboarding@resend.dev>";

fn effective_from(from: &str) -> String {
    let from = from.trim();
    if from.is_empty() {
        DEFAULT_FROM.to_string()
    } else {
        from.to_string()
    }
}

async fn send_logged(
    provider: &dyn EmailProvider,
    message: &EmailMessage,
    contact_id: &str,
    kind: &'static str,
) -> AppResult<bool> {
    let started = Instant::now();
    let result = provider.send(message).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(true) => tracing::info!(
            contact_id,
            provider = provider.name(),
            duration_ms,
            "{kind} sent"
        ),
        Ok(false) => tracing::warn!(
            contact_id,
            provider = provider.name(),
            duration_ms,
            "{kind} rejected by provider"
        ),
        Err(e) => tracing::warn!(
            contact_id,
            provider = provider.name(),
            duration_ms,
            error = %e,
            "{kind} failed"
        ),
    }

    result
}

/// Tells the site owner a contact message arrived
pub struct OwnerNotification {
    provider: Arc<dyn EmailProvider>,
    owner_address: Option<String>,
    from: String,
}

impl OwnerNotification {
    pub fn new(provider: Arc<dyn EmailProvider>, owner_address: Option<String>, from: &str) -> Self {
        Self {
            provider,
            owner_address: owner_address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            from: effective_from(from),
        }
    }
}

#[async_trait]
impl DeliveryCallback for OwnerNotification {
    async fn send(&self, contact: &Contact) -> AppResult<bool> {
        let Some(ref owner) = self.owner_address else {
            tracing::debug!(contact_id = %contact.id, "Owner notification disabled, nothing to send");
            return Ok(true);
        };

        let rendered = templates::owner_notification(contact);
        let message = EmailMessage {
            from: self.from.clone(),
            to: owner.clone(),
            subject: rendered.subject,
            html: rendered.html,
            idempotency_key: Some(format!("contact-notify/{}", contact.id)),
        };

        send_logged(self.provider.as_ref(), &message, &contact.id, "Owner notification").await
    }

    fn name(&self) -> &'static str {
        "contact-notify-owner"
    }
}

/// Automatic acknowledgement to the visitor
pub struct SenderAutoReply {
    provider: Arc<dyn EmailProvider>,
    from: String,
}

impl SenderAutoReply {
    pub fn new(provider: Arc<dyn EmailProvider>, from: &str) -> Self {
        Self {
            provider,
            from: effective_from(from),
        }
    }
}

#[async_trait]
impl DeliveryCallback for SenderAutoReply {
    async fn send(&self, contact: &Contact) -> AppResult<bool> {
        let Some(to) = contact.reply_address() else {
            tracing::debug!(contact_id = %contact.id, "Contact has no email address, auto-reply skipped");
            return Ok(true);
        };

        let rendered = templates::sender_reply(contact);
        let message = EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: rendered.subject,
            html: rendered.html,
            idempotency_key: Some(format!("contact-reply/{}", contact.id)),
        };

        send_logged(self.provider.as_ref(), &message, &contact.id, "Auto-reply").await
    }

    fn name(&self) -> &'static str {
        "contact-reply-sender"
    }
}

/// Registry with a callback for every contact job type.
///
/// Both types are always registered so that jobs enqueued under an older
/// configuration can still be delivered.
pub fn contact_registry(
    provider: Arc<dyn EmailProvider>,
    contact: &ContactConfig,
    from: &str,
) -> DeliveryRegistry {
    DeliveryRegistry::new()
        .with(
            EmailJobType::ContactNotifyOwner,
            Arc::new(OwnerNotification::new(
                provider.clone(),
                contact.owner_address().map(str::to_string),
                from,
            )),
        )
        .with(
            EmailJobType::ContactReplySender,
            Arc::new(SenderAutoReply::new(provider, from)),
        )
}
