//! Fixed-delay poll loop driving reclaim, claim and processing.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;

use crate::config::EmailQueueConfig;
use crate::error::AppResult;
use crate::jobs::claimer::JobClaimer;
use crate::jobs::clock::Clock;
use crate::jobs::processor::{JobProcessor, ProcessOutcome};

/// Counters of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reclaimed: usize,
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Jobs whose outcome could not be written because the store failed
    pub errored: usize,
}

impl TickReport {
    fn record(&mut self, outcome: &AppResult<ProcessOutcome>) {
        match outcome {
            Ok(ProcessOutcome::Sent) => self.sent += 1,
            Ok(ProcessOutcome::Retried { .. }) => self.retried += 1,
            Ok(ProcessOutcome::Failed { .. }) => self.failed += 1,
            Ok(ProcessOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.errored += 1,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.reclaimed == 0 && self.claimed == 0
    }
}

pub struct EmailQueueWorker {
    config: EmailQueueConfig,
    claimer: JobClaimer,
    processor: JobProcessor,
    clock: Arc<dyn Clock>,
}

impl EmailQueueWorker {
    pub fn new(
        config: EmailQueueConfig,
        claimer: JobClaimer,
        processor: JobProcessor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            claimer,
            processor,
            clock,
        }
    }

    /// One poll cycle: release stale locks, claim a batch, process it.
    ///
    /// Fails only when reclaiming or claiming cannot reach the store. Per-job
    /// store errors are logged and counted.
    pub async fn tick(&self) -> AppResult<TickReport> {
        let mut report = TickReport::default();

        let now = self.clock.now_ms();
        report.reclaimed = self
            .claimer
            .reclaim_stale(now, self.config.stale_lock_ms)
            .await?;

        let now = self.clock.now_ms();
        let batch = self
            .claimer
            .claim_batch(now, self.config.batch_size)
            .await?;
        report.claimed = batch.len();

        let processor = &self.processor;
        let outcomes: Vec<AppResult<ProcessOutcome>> = stream::iter(batch)
            .map(|job| async move {
                let outcome = processor.process(&job).await;
                if let Err(ref e) = outcome {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to record email job outcome");
                }
                outcome
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in &outcomes {
            report.record(outcome);
        }

        if !report.is_idle() {
            tracing::info!(
                reclaimed = report.reclaimed,
                claimed = report.claimed,
                sent = report.sent,
                retried = report.retried,
                failed = report.failed,
                skipped = report.skipped,
                errored = report.errored,
                "Email queue tick finished"
            );
        }

        Ok(report)
    }

    /// Run ticks until `shutdown` is cancelled.
    ///
    /// The next tick starts `poll_interval` after the previous one finished;
    /// a tick in progress always completes before the loop exits.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            stale_lock_ms = self.config.stale_lock_ms,
            concurrency = self.config.concurrency,
            "Email queue worker started"
        );

        while !shutdown.is_cancelled() {
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "Email queue tick failed, retrying next tick");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        tracing::info!("Email queue worker stopped");
    }
}
