use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult, DatabaseErrorConverter};
use crate::jobs::store::JobStore;
use crate::models::{EmailJob, EmailJobStatus, JobTransition};
use crate::schema::email_jobs;

/// PostgreSQL-backed [`JobStore`]
#[derive(Clone)]
pub struct EmailJobRepository {
    pool: AsyncDbPool,
}

impl EmailJobRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for EmailJobRepository {
    async fn insert(&self, job: EmailJob) -> AppResult<EmailJob> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(email_jobs::table)
            .values(&job)
            .returning(EmailJob::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, "insert email job"))
    }

    async fn find_due(
        &self,
        status: EmailJobStatus,
        max_next_attempt_ms: i64,
        limit: u32,
    ) -> AppResult<Vec<EmailJob>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        email_jobs::table
            .filter(email_jobs::status.eq(status))
            .filter(email_jobs::next_attempt_at_ms.le(max_next_attempt_ms))
            .order((email_jobs::created_at_ms.asc(), email_jobs::id.asc()))
            .limit(i64::from(limit))
            .select(EmailJob::as_select())
            .load(&mut conn)
            .await
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, "find due email jobs"))
    }

    async fn find_stale(
        &self,
        status: EmailJobStatus,
        locked_before_ms: i64,
    ) -> AppResult<Vec<EmailJob>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        email_jobs::table
            .filter(email_jobs::status.eq(status))
            .filter(email_jobs::locked_at_ms.lt(locked_before_ms))
            .order(email_jobs::locked_at_ms.asc())
            .select(EmailJob::as_select())
            .load(&mut conn)
            .await
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, "find stale email jobs"))
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_status: EmailJobStatus,
        expected_version: i64,
        transition: &JobTransition,
    ) -> AppResult<bool> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        // UPDATE ... WHERE id = ? AND status = ? AND version = ?
        let updated = diesel::update(
            email_jobs::table
                .filter(email_jobs::id.eq(id))
                .filter(email_jobs::status.eq(expected_status))
                .filter(email_jobs::version.eq(expected_version)),
        )
        .set((transition, email_jobs::version.eq(email_jobs::version + 1)))
        .execute(&mut conn)
        .await
        .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, "update email job"))?;

        Ok(updated == 1)
    }

    async fn get_by_id(&self, id: &str) -> AppResult<Option<EmailJob>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        email_jobs::table
            .find(id)
            .select(EmailJob::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, "get email job"))
    }
}
