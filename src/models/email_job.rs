//! Email job models for database operations.
//!
//! A job row is the durable unit of work of the email queue. Every state
//! change is expressed as a [`JobTransition`] so that the PostgreSQL and the
//! in-process stores apply exactly the same mutation.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use diesel::AsExpression;
use diesel::FromSqlRow;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::email_jobs;

/// Upper bound of the stored `last_error`, in characters
pub const MAX_ERROR_LENGTH: usize = 2000;

// ============================================================================
// Enums
// ============================================================================

/// Lifecycle state of an email job
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailJobStatus {
    Pending,
    InProgress,
    Sent,
    Failed,
}

impl EmailJobStatus {
    pub const ALL: [EmailJobStatus; 4] = [
        EmailJobStatus::Pending,
        EmailJobStatus::InProgress,
        EmailJobStatus::Sent,
        EmailJobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailJobStatus::Pending => "PENDING",
            EmailJobStatus::InProgress => "IN_PROGRESS",
            EmailJobStatus::Sent => "SENT",
            EmailJobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for EmailJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailJobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unrecognized email job status: {}", s))
    }
}

impl diesel::query_builder::QueryId for EmailJobStatus {
    type QueryId = EmailJobStatus;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for EmailJobStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for EmailJobStatus {
    fn from_sql(bytes: <Pg as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        s.parse().map_err(Into::into)
    }
}

/// Kind of email a job delivers; dispatched through the delivery registry
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailJobType {
    /// Tell the site owner a contact message arrived
    ContactNotifyOwner,
    /// Acknowledge the message to the visitor who sent it
    ContactReplySender,
}

impl EmailJobType {
    pub const ALL: [EmailJobType; 2] = [
        EmailJobType::ContactNotifyOwner,
        EmailJobType::ContactReplySender,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailJobType::ContactNotifyOwner => "CONTACT_NOTIFY_OWNER",
            EmailJobType::ContactReplySender => "CONTACT_REPLY_SENDER",
        }
    }
}

impl fmt::Display for EmailJobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailJobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailJobType::ALL
            .into_iter()
            .find(|job_type| job_type.as_str() == s)
            .ok_or_else(|| format!("Unrecognized email job type: {}", s))
    }
}

impl diesel::query_builder::QueryId for EmailJobType {
    type QueryId = EmailJobType;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for EmailJobType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for EmailJobType {
    fn from_sql(bytes: <Pg as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        s.parse().map_err(Into::into)
    }
}

// ============================================================================
// EmailJob Models (Query/Insert/Update)
// ============================================================================

/// Email job row, used for SELECT and INSERT
#[derive(
    Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Insertable, Serialize, Deserialize,
)]
#[diesel(table_name = email_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmailJob {
    pub id: String,
    pub job_type: EmailJobType,
    pub status: EmailJobStatus,
    /// Id of the contact message, never the payload itself
    pub reference_id: Option<String>,
    pub attempts: i32,
    pub next_attempt_at_ms: i64,
    pub locked_at_ms: Option<i64>,
    pub last_error: Option<String>,
    pub version: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl EmailJob {
    /// A fresh job, due immediately.
    pub fn new_pending(job_type: EmailJobType, reference_id: Option<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            status: EmailJobStatus::Pending,
            reference_id,
            attempts: 0,
            next_attempt_at_ms: now_ms,
            locked_at_ms: None,
            last_error: None,
            version: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Trimmed reference id; `None` when absent or blank.
    pub fn reference(&self) -> Option<&str> {
        self.reference_id
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Next attempt is scheduled at or before `now_ms`, whatever the status.
    pub fn scheduled_by(&self, now_ms: i64) -> bool {
        self.next_attempt_at_ms <= now_ms
    }

    /// Lock taken strictly before `locked_before_ms`; unlocked jobs never match.
    pub fn locked_before(&self, locked_before_ms: i64) -> bool {
        self.locked_at_ms.is_some_and(|locked_at| locked_at < locked_before_ms)
    }

    /// Apply a transition in memory, bumping `version` like the SQL update does.
    pub fn apply(&mut self, transition: &JobTransition) {
        self.status = transition.status;
        if let Some(attempts) = transition.attempts {
            self.attempts = attempts;
        }
        if let Some(next_attempt_at_ms) = transition.next_attempt_at_ms {
            self.next_attempt_at_ms = next_attempt_at_ms;
        }
        if let Some(locked_at_ms) = transition.locked_at_ms {
            self.locked_at_ms = locked_at_ms;
        }
        if let Some(ref last_error) = transition.last_error {
            self.last_error = last_error.clone();
        }
        self.updated_at_ms = transition.updated_at_ms;
        self.version += 1;
    }
}

/// A guarded state change of one job.
///
/// `None` leaves a column untouched; `Some(None)` on a nullable column clears it.
#[derive(Debug, Clone, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = email_jobs)]
pub struct JobTransition {
    pub status: EmailJobStatus,
    pub attempts: Option<i32>,
    pub next_attempt_at_ms: Option<i64>,
    pub locked_at_ms: Option<Option<i64>>,
    pub last_error: Option<Option<String>>,
    pub updated_at_ms: i64,
}

impl JobTransition {
    /// PENDING -> IN_PROGRESS
    pub fn claim(now_ms: i64) -> Self {
        Self {
            status: EmailJobStatus::InProgress,
            attempts: None,
            next_attempt_at_ms: None,
            locked_at_ms: Some(Some(now_ms)),
            last_error: None,
            updated_at_ms: now_ms,
        }
    }

    /// IN_PROGRESS -> PENDING without touching attempts or schedule
    pub fn release(now_ms: i64) -> Self {
        Self {
            status: EmailJobStatus::Pending,
            attempts: None,
            next_attempt_at_ms: None,
            locked_at_ms: Some(None),
            last_error: None,
            updated_at_ms: now_ms,
        }
    }

    pub fn sent(now_ms: i64) -> Self {
        Self {
            status: EmailJobStatus::Sent,
            attempts: None,
            next_attempt_at_ms: None,
            locked_at_ms: Some(None),
            last_error: Some(None),
            updated_at_ms: now_ms,
        }
    }

    pub fn retry(attempts: i32, next_attempt_at_ms: i64, error: &str, now_ms: i64) -> Self {
        Self {
            status: EmailJobStatus::Pending,
            attempts: Some(attempts),
            next_attempt_at_ms: Some(next_attempt_at_ms),
            locked_at_ms: Some(None),
            last_error: Some(Some(truncate_error(error))),
            updated_at_ms: now_ms,
        }
    }

    /// Terminal failure; `next_attempt_at_ms` keeps its last value
    pub fn fail(attempts: i32, error: &str, now_ms: i64) -> Self {
        Self {
            status: EmailJobStatus::Failed,
            attempts: Some(attempts),
            next_attempt_at_ms: None,
            locked_at_ms: Some(None),
            last_error: Some(Some(truncate_error(error))),
            updated_at_ms: now_ms,
        }
    }
}

/// Cut an error message to [`MAX_ERROR_LENGTH`] characters.
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_LENGTH).collect()
}
