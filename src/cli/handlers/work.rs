//! Work command handler
//!
//! Wires the PostgreSQL store, the email provider (Resend, or an SMTP relay
//! when no API key is set) and the contact callbacks into an
//! [`EmailQueueWorker`] and runs it until a shutdown signal arrives.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;

use super::migrate::run_pending_migrations;
use crate::config::ResendConfig;
use crate::config::settings::Settings;
use crate::db::establish_async_connection_pool;
use crate::error::{AppError, AppResult};
use crate::jobs::{
    Clock, EmailQueueWorker, JobClaimer, JobProcessor, JobStore, RetryPolicy, SystemClock,
};
use crate::models::EmailJobStatus;
use crate::repositories::Repositories;
use crate::services::delivery::{
    DEFAULT_FROM, EmailProvider, ResendProvider, SmtpProvider, contact_registry,
};

/// Jobs the next tick would touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// PENDING jobs due now, capped at the batch size
    pub due: usize,
    /// IN_PROGRESS jobs whose lock is older than the threshold
    pub stale: usize,
}

/// Email provider chosen for this run, with the sender it sends as
pub struct SelectedProvider {
    pub provider: Arc<dyn EmailProvider>,
    pub from: String,
    pub warm_up: bool,
}

/// Handler for the work command
pub struct WorkCommandHandler {
    config: Settings,
}

impl WorkCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Run the worker loop, a single tick (`once`) or a read-only report (`dry_run`).
    ///
    /// # Errors
    /// - `AppError::Configuration` when neither a Resend API key nor an SMTP
    ///   host is set
    /// - Connection pool and migration errors during startup
    /// - Store errors of the single tick when `once` is set
    pub async fn execute(&self, once: bool, dry_run: bool) -> AppResult<()> {
        let settings = &self.config;

        tracing::info!(
            app_name = %settings.application.name,
            app_version = %settings.application.version,
            "Application starting"
        );

        if dry_run {
            return self.report().await;
        }

        if !settings.email_queue.enabled && !once {
            tracing::warn!("Email queue is disabled (email_queue.enabled = false), nothing to do");
            return Ok(());
        }

        let selected = select_provider(settings)?;
        tracing::info!(
            provider = selected.provider.name(),
            from = %selected.from,
            "Email provider selected"
        );

        if settings.database.auto_migrate {
            run_pending_migrations(settings.database.url.clone()).await?;
        }

        let pool = establish_async_connection_pool(&settings.database).await?;
        let repos = Repositories::new(pool);

        if selected.warm_up
            && let Err(e) = selected.provider.warm_up().await
        {
            tracing::warn!(error = %e, "Email provider warm-up failed");
        }

        let registry = contact_registry(selected.provider, &settings.contact, &selected.from);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store: Arc<dyn JobStore> = Arc::new(repos.email_jobs);
        let processor = JobProcessor::new(
            store.clone(),
            Arc::new(repos.contacts),
            registry,
            RetryPolicy::from(&settings.email_queue),
            clock.clone(),
        );
        let worker = EmailQueueWorker::new(
            settings.email_queue.clone(),
            JobClaimer::new(store),
            processor,
            clock,
        );

        if once {
            let report = worker.tick().await?;
            println!(
                "Tick finished: reclaimed={} claimed={} sent={} retried={} failed={} skipped={} errored={}",
                report.reclaimed,
                report.claimed,
                report.sent,
                report.retried,
                report.failed,
                report.skipped,
                report.errored
            );
            return Ok(());
        }

        let shutdown = CancellationToken::new();
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                shutdown_signal().await;
                shutdown.cancel();
            }
        });

        worker.run(shutdown).await;
        Ok(())
    }

    async fn report(&self) -> AppResult<()> {
        let pool = establish_async_connection_pool(&self.config.database).await?;
        let store = Repositories::new(pool).email_jobs;
        let snapshot = queue_snapshot(&store, &self.config, SystemClock.now_ms()).await?;

        println!(
            "Next tick would reclaim {} stale job(s) and claim {} due job(s)",
            snapshot.stale, snapshot.due
        );
        if !self.config.resend.is_configured() && !self.config.smtp.is_configured() {
            println!("Warning: neither resend.api_key nor smtp.host is set, `work` will refuse to start");
        }
        Ok(())
    }
}

/// Counts due and stale jobs without changing any of them.
pub async fn queue_snapshot(
    store: &dyn JobStore,
    settings: &Settings,
    now_ms: i64,
) -> AppResult<QueueSnapshot> {
    let queue = &settings.email_queue;
    let locked_before = now_ms.saturating_sub(i64::try_from(queue.stale_lock_ms).unwrap_or(i64::MAX));

    let stale = store
        .find_stale(EmailJobStatus::InProgress, locked_before)
        .await?
        .len();
    let due = store
        .find_due(EmailJobStatus::Pending, now_ms, queue.batch_size)
        .await?
        .len();

    Ok(QueueSnapshot { due, stale })
}

/// Resend when an API key is set, otherwise the SMTP relay.
///
/// Must run inside the Tokio runtime; the SMTP connection pool starts its
/// housekeeping task when built.
pub fn select_provider(settings: &Settings) -> AppResult<SelectedProvider> {
    if settings.resend.is_configured() {
        return Ok(SelectedProvider {
            provider: Arc::new(ResendProvider::new(&settings.resend)?),
            from: sender(&settings.resend).to_string(),
            warm_up: settings.resend.warm_up,
        });
    }

    if settings.smtp.is_configured() {
        return Ok(SelectedProvider {
            provider: Arc::new(SmtpProvider::new(&settings.smtp)?),
            from: settings.smtp.sender().to_string(),
            warm_up: settings.smtp.warm_up,
        });
    }

    Err(AppError::Configuration {
        key: "resend.api_key".to_string(),
        source: anyhow::anyhow!(
            "No email provider is configured. Set MAILER_RESEND__API_KEY, or smtp.host for an SMTP relay."
        ),
    })
}

fn sender(resend: &ResendConfig) -> &str {
    let from = resend.from_email.trim();
    if from.is_empty() { DEFAULT_FROM } else { from }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, finishing current tick");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, finishing current tick");
        }
    }
}
