//! Database operations for the durable notification queue.
//!
//! Jobs are claimed with `FOR UPDATE SKIP LOCKED` so multiple worker
//! instances can drain the queue without double delivery.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use atelier_core::NotificationJobId;

use super::RepositoryError;
use crate::notifications::{NotificationJob, RetryPolicy};

/// Delivery state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for (re)delivery.
    Pending,
    /// Delivered successfully.
    Delivered,
    /// All attempts exhausted.
    Failed,
}

/// Internal row type for notification job queries.
#[derive(Debug, sqlx::FromRow)]
struct NotificationJobRow {
    id: NotificationJobId,
    payload: serde_json::Value,
    status: JobStatus,
    attempts: i32,
    max_attempts: i32,
    backoff_base_secs: i64,
    next_attempt_at: DateTime<Utc>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

/// A job claimed for delivery.
#[derive(Debug, Clone)]
pub struct QueuedNotification {
    /// Queue row ID.
    pub id: NotificationJobId,
    /// The parsed job.
    pub job: NotificationJob,
    /// Delivery state.
    pub status: JobStatus,
    /// Attempts made so far, including the one currently claimed.
    pub attempts: i32,
    /// Attempts allowed in total.
    pub max_attempts: i32,
    /// Base backoff delay in seconds.
    pub backoff_base_secs: i64,
    /// Earliest time of the next delivery attempt.
    pub next_attempt_at: DateTime<Utc>,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationJobRow> for QueuedNotification {
    type Error = RepositoryError;

    fn try_from(row: NotificationJobRow) -> Result<Self, Self::Error> {
        let job: NotificationJob = serde_json::from_value(row.payload)
            .map_err(|e| RepositoryError::DataCorruption(format!("bad job payload: {e}")))?;

        Ok(Self {
            id: row.id,
            job,
            status: row.status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            backoff_base_secs: row.backoff_base_secs,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            created_at: row.created_at,
        })
    }
}

const JOB_COLUMNS: &str = r"
    id, payload, status, attempts, max_attempts, backoff_base_secs,
    next_attempt_at, last_error, created_at
";

/// Repository for notification queue operations.
pub struct NotificationJobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationJobRepository<'a> {
    /// Create a new notification job repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending job, due immediately.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn enqueue(
        &self,
        job: &NotificationJob,
        retry: RetryPolicy,
    ) -> Result<NotificationJobId, RepositoryError> {
        let payload = serde_json::to_value(job)
            .map_err(|e| RepositoryError::DataCorruption(format!("unserializable job: {e}")))?;

        let id: NotificationJobId = sqlx::query_scalar(
            r"
            INSERT INTO notification_jobs
                (id, job_type, payload, max_attempts, backoff_base_secs, next_attempt_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING id
            ",
        )
        .bind(NotificationJobId::generate())
        .bind(job.kind())
        .bind(&payload)
        .bind(i32::try_from(retry.attempts).unwrap_or(i32::MAX))
        .bind(i64::try_from(retry.base_delay.as_secs()).unwrap_or(i64::MAX))
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Claim up to `limit` due jobs, bumping their attempt counter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails and
    /// `RepositoryError::DataCorruption` if a payload fails to parse.
    pub async fn claim_due(
        &self,
        limit: i64,
    ) -> Result<Vec<QueuedNotification>, RepositoryError> {
        let rows: Vec<NotificationJobRow> = sqlx::query_as(&format!(
            r"
            UPDATE notification_jobs
            SET attempts = attempts + 1
            WHERE id IN (
                SELECT id FROM notification_jobs
                WHERE status = 'pending' AND next_attempt_at <= now()
                ORDER BY next_attempt_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Mark a job as delivered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the job doesn't exist and
    /// `RepositoryError::Database` for other failures.
    pub async fn mark_delivered(&self, id: NotificationJobId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notification_jobs
            SET status = 'delivered', last_error = NULL
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Record a failed attempt and schedule the next one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the job doesn't exist and
    /// `RepositoryError::Database` for other failures.
    pub async fn reschedule(
        &self,
        id: NotificationJobId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notification_jobs
            SET last_error = $2, next_attempt_at = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Mark a job as failed for good.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the job doesn't exist and
    /// `RepositoryError::Database` for other failures.
    pub async fn mark_failed(
        &self,
        id: NotificationJobId,
        error: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notification_jobs
            SET status = 'failed', last_error = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
