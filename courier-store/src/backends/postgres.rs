use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_common::internal;
use sqlx::{
    FromRow, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::{EmailJob, JobId, JobStatus, StoreError, r#trait::JobStore};

const SCHEMA: &str = include_str!("../../migrations/0001_scheduled_emails.sql");

const FETCH_DUE: &str = r"
    SELECT id, to_email, subject, message, schedule_time, status, attempt_count, next_attempt_at
    FROM scheduled_emails
    WHERE status = 'pending'
      AND schedule_time <= $1
      AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
    ORDER BY schedule_time ASC, id ASC
    LIMIT $2
";

const CLAIM: &str = r"
    UPDATE scheduled_emails
    SET status = 'processing', attempt_count = attempt_count + 1
    WHERE id = $1
      AND status = 'pending'
      AND schedule_time <= $2
      AND (next_attempt_at IS NULL OR next_attempt_at <= $2)
    RETURNING attempt_count
";

const RESOLVE: &str = r"
    UPDATE scheduled_emails
    SET status = $2
    WHERE id = $1 AND status IN ('processing', $2)
";

const REQUEUE: &str = r"
    UPDATE scheduled_emails
    SET status = 'pending', next_attempt_at = $2
    WHERE id = $1 AND status = 'processing'
";

const CURRENT_STATUS: &str = "SELECT status FROM scheduled_emails WHERE id = $1";

#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    to_email: String,
    subject: Option<String>,
    message: Option<String>,
    schedule_time: DateTime<Utc>,
    status: String,
    attempt_count: i32,
    next_attempt_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for EmailJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: JobId::new(row.id),
            to_address: row.to_email,
            subject: row.subject.unwrap_or_default(),
            body: row.message.unwrap_or_default(),
            scheduled_time: row.schedule_time,
            status: row.status.parse()?,
            attempt_count: u32::try_from(row.attempt_count).unwrap_or(0),
            next_attempt_at: row.next_attempt_at,
        })
    }
}

/// `scheduled_emails` table in PostgreSQL
///
/// The claim is a single conditional `UPDATE ... WHERE status = 'pending'`
/// that also re-checks the due condition; only the winning row comes back
/// with its new attempt count, so concurrent dispatchers in separate
/// processes never both deliver the same job.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Build a lazily connecting pool.
    ///
    /// Only the URL is validated here; connectivity problems surface per cycle
    /// as [`StoreError::Unavailable`] instead of failing start-up.
    ///
    /// # Errors
    /// If the connection URL cannot be parsed
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> crate::Result<Self> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| StoreError::Configuration(format!("invalid database url: {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);

        internal!(
            "Postgres job store configured with max_connections={max_connections}, acquire_timeout={}s",
            acquire_timeout.as_secs()
        );

        Ok(Self { pool })
    }

    /// Create the table and the columns the dispatcher relies on if missing
    ///
    /// # Errors
    /// If the statements cannot be executed
    pub async fn ensure_schema(&self) -> crate::Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        internal!(level = INFO, "Ensured scheduled_emails schema");
        Ok(())
    }

    /// Explain a conditional update that matched no row
    async fn diagnose(&self, id: JobId, to: JobStatus) -> StoreError {
        let current: Result<Option<String>, sqlx::Error> = sqlx::query_scalar(CURRENT_STATUS)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await;

        match current {
            Ok(None) => StoreError::NotFound(id),
            Ok(Some(status)) => match status.parse::<JobStatus>() {
                Ok(from) => StoreError::InvalidTransition { id, from, to },
                Err(e) => e,
            },
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn fetch_due_batch(&self, now: DateTime<Utc>, limit: usize) -> crate::Result<Vec<EmailJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(FETCH_DUE)
            .bind(now)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(EmailJob::try_from).collect()
    }

    async fn mark_processing(&self, id: JobId, now: DateTime<Utc>) -> crate::Result<Option<u32>> {
        let claimed: Option<i32> = sqlx::query_scalar(CLAIM)
            .bind(id.get())
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(count) = claimed {
            return Ok(Some(u32::try_from(count).unwrap_or(0)));
        }

        // A pending row that is not yet due reports as a refused transition
        match self.diagnose(id, JobStatus::Processing).await {
            StoreError::InvalidTransition { .. } => Ok(None),
            other => Err(other),
        }
    }

    async fn mark_sent(&self, id: JobId) -> crate::Result<()> {
        let result = sqlx::query(RESOLVE)
            .bind(id.get())
            .bind(JobStatus::Sent.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.diagnose(id, JobStatus::Sent).await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: JobId) -> crate::Result<()> {
        let result = sqlx::query(RESOLVE)
            .bind(id.get())
            .bind(JobStatus::Failed.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.diagnose(id, JobStatus::Failed).await);
        }
        Ok(())
    }

    async fn requeue(&self, id: JobId, retry_at: DateTime<Utc>) -> crate::Result<()> {
        let result = sqlx::query(REQUEUE)
            .bind(id.get())
            .bind(retry_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.diagnose(id, JobStatus::Pending).await);
        }
        Ok(())
    }
}
