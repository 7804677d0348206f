//! SMTP relay provider.
//!
//! Used when no Resend API key is configured. Every refused or failed send
//! is reported as `Ok(false)` so the queue schedules a retry; the SMTP
//! reply class is only logged.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::provider::{EmailMessage, EmailProvider};
use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::{AppError, AppResult};

/// Domain part of the `Message-ID` derived from an idempotency key
const MESSAGE_ID_DOMAIN: &str = "mailer-rs";

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    /// Builds the pooled transport; no connection is opened until the first
    /// send or [`EmailProvider::warm_up`].
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        if !config.is_configured() {
            return Err(AppError::Validation {
                field: "smtp.host".to_string(),
                reason: "SMTP host is not configured".to_string(),
            });
        }

        let host = config.host.trim();
        let builder = match config.security {
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpSecurity::Plain => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| AppError::Configuration {
            key: "smtp.host".to_string(),
            source: anyhow::Error::from(e),
        })?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        let username = config.username.trim();
        if !username.is_empty() {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

/// Renders an [`EmailMessage`] as an HTML mail.
///
/// The idempotency key becomes the `Message-ID`, so every attempt of the
/// same job carries the same id.
fn build_message(message: &EmailMessage) -> AppResult<Message> {
    let from: Mailbox = message
        .from
        .trim()
        .parse()
        .map_err(|e| AppError::delivery("smtp", format!("invalid sender: {}", e)))?;
    let to: Mailbox = message
        .to
        .trim()
        .parse()
        .map_err(|e| AppError::delivery("smtp", format!("invalid recipient: {}", e)))?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_HTML);
    if let Some(key) = message
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        builder = builder.message_id(Some(format!(
            "<{}@{}>",
            key.replace('/', "."),
            MESSAGE_ID_DOMAIN
        )));
    }

    builder
        .body(message.html.clone())
        .map_err(|e| AppError::delivery("smtp", format!("cannot build message: {}", e)))
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, message: &EmailMessage) -> AppResult<bool> {
        if message.to.trim().is_empty() || message.from.trim().is_empty() {
            tracing::warn!("SMTP: sender or recipient is empty, send skipped");
            return Ok(false);
        }

        let mail = match build_message(message) {
            Ok(mail) => mail,
            Err(e) => {
                tracing::warn!(error = %e, "SMTP: message rejected before sending");
                return Ok(false);
            }
        };

        let started = Instant::now();
        match self.transport.send(mail).await {
            Ok(response) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                if response.is_positive() {
                    tracing::debug!(
                        code = %response.code(),
                        duration_ms,
                        "SMTP relay accepted email"
                    );
                    Ok(true)
                } else {
                    tracing::warn!(
                        code = %response.code(),
                        duration_ms,
                        "SMTP relay did not accept email"
                    );
                    Ok(false)
                }
            }
            Err(e) => {
                tracing::warn!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    permanent = e.is_permanent(),
                    transient = e.is_transient(),
                    timeout = e.is_timeout(),
                    error = %e,
                    "SMTP send failed"
                );
                Ok(false)
            }
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }

    /// Opens a pooled connection and checks it with `NOOP`.
    async fn warm_up(&self) -> AppResult<()> {
        let started = Instant::now();
        let connected = self
            .transport
            .test_connection()
            .await
            .map_err(|e| AppError::delivery("smtp", format!("warm-up failed: {}", e)))?;
        if !connected {
            return Err(AppError::delivery("smtp", "warm-up failed: relay did not answer NOOP"));
        }

        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            "SMTP connection warmed up"
        );
        Ok(())
    }
}
