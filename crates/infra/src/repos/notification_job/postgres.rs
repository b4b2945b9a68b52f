use super::INotificationJobRepo;
use booking_notifier_domain::{
    DeadLetterRecord, NotificationJob, NotificationJobStatus, NotificationJobType, ID,
};
use sqlx::{types::Uuid, FromRow, PgPool};
use std::convert::TryFrom;
use tracing::error;

pub struct PostgresNotificationJobRepo {
    pool: PgPool,
}

impl PostgresNotificationJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct NotificationJobRaw {
    job_seq: i64,
    job_uid: Uuid,
    job_type: String,
    payload: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created: i64,
    processed: Option<i64>,
    next_eligible_at: i64,
    claimed_at: Option<i64>,
}

impl TryFrom<NotificationJobRaw> for NotificationJob {
    type Error = anyhow::Error;

    fn try_from(raw: NotificationJobRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: raw.job_uid.into(),
            job_type: raw.job_type.parse::<NotificationJobType>()?,
            payload: raw.payload,
            status: raw.status.parse::<NotificationJobStatus>()?,
            attempts: raw.attempts,
            last_error: raw.last_error,
            created: raw.created,
            processed: raw.processed,
            next_eligible_at: raw.next_eligible_at,
            claimed_at: raw.claimed_at,
        })
    }
}

fn into_jobs(mut rows: Vec<NotificationJobRaw>) -> anyhow::Result<Vec<NotificationJob>> {
    rows.sort_by_key(|row| (row.created, row.job_seq));
    rows.into_iter().map(NotificationJob::try_from).collect()
}

#[async_trait::async_trait]
impl INotificationJobRepo for PostgresNotificationJobRepo {
    async fn insert(&self, job: &NotificationJob) -> anyhow::Result<()> {
        insert_job(&self.pool, job).await
    }

    async fn find(&self, job_id: &ID) -> Option<NotificationJob> {
        let res: Result<Option<NotificationJobRaw>, _> = sqlx::query_as(
            r#"
            SELECT * FROM notification_jobs AS j
            WHERE j.job_uid = $1
            "#,
        )
        .bind(job_id.inner_ref())
        .fetch_optional(&self.pool)
        .await;

        match res {
            Ok(Some(raw)) => NotificationJob::try_from(raw)
                .map_err(|e| error!("Stored notification job {} is invalid: {:?}", job_id, e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                error!("Unable to find notification job {}: {:?}", job_id, e);
                None
            }
        }
    }

    async fn find_all(&self) -> anyhow::Result<Vec<NotificationJob>> {
        let rows: Vec<NotificationJobRaw> = sqlx::query_as(
            r#"
            SELECT * FROM notification_jobs
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        into_jobs(rows)
    }

    async fn claim_due(
        &self,
        now: i64,
        max_attempts: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<NotificationJob>> {
        // Rows locked by another claimer are skipped instead of waited for,
        // so a job is never claimed twice.
        let rows: Vec<NotificationJobRaw> = sqlx::query_as(
            r#"
            UPDATE notification_jobs AS j
            SET status = 'processing',
                attempts = j.attempts + 1,
                claimed_at = $1
            WHERE j.job_uid IN (
                SELECT c.job_uid FROM notification_jobs AS c
                WHERE c.status IN ('pending', 'failed')
                    AND c.attempts < $2
                    AND c.next_eligible_at <= $1
                ORDER BY c.created, c.job_seq
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        // RETURNING does not keep the order of the subquery
        into_jobs(rows)
    }

    async fn find_stale(&self, claimed_before: i64) -> anyhow::Result<Vec<NotificationJob>> {
        let rows: Vec<NotificationJobRaw> = sqlx::query_as(
            r#"
            SELECT * FROM notification_jobs AS j
            WHERE j.status = 'processing'
                AND (j.claimed_at IS NULL OR j.claimed_at <= $1)
            "#,
        )
        .bind(claimed_before)
        .fetch_all(&self.pool)
        .await?;
        into_jobs(rows)
    }

    async fn mark_sent(&self, job_id: &ID, attempt: i64, now: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE notification_jobs
            SET status = 'sent', processed = $3, last_error = NULL
            WHERE job_uid = $1 AND attempts = $2 AND status = 'processing'
            "#,
        )
        .bind(job_id.inner_ref())
        .bind(attempt)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_failed(
        &self,
        job_id: &ID,
        attempt: i64,
        error: &str,
        now: i64,
        next_eligible_at: i64,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE notification_jobs
            SET status = 'failed', last_error = $3, processed = $4, next_eligible_at = $5
            WHERE job_uid = $1 AND attempts = $2 AND status = 'processing'
            "#,
        )
        .bind(job_id.inner_ref())
        .bind(attempt)
        .bind(error)
        .bind(now)
        .bind(next_eligible_at)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn move_to_dead_letters(
        &self,
        job_id: &ID,
        attempt: i64,
        error: &str,
        now: i64,
    ) -> anyhow::Result<Option<DeadLetterRecord>> {
        let mut tx = self.pool.begin().await?;

        let raw: Option<NotificationJobRaw> = sqlx::query_as(
            r#"
            DELETE FROM notification_jobs AS j
            WHERE j.job_uid = $1 AND j.attempts = $2 AND j.status = 'processing'
            RETURNING *
            "#,
        )
        .bind(job_id.inner_ref())
        .bind(attempt)
        .fetch_optional(&mut *tx)
        .await?;

        let job = match raw {
            Some(raw) => NotificationJob::try_from(raw)?,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };
        let record = job.into_dead_letter(error, now);

        sqlx::query(
            r#"
            INSERT INTO notification_dead_letters
            (original_job_uid, job_type, payload, attempts, last_error, failed_at)
            VALUES($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.original_job_id.inner_ref())
        .bind(record.job_type.as_str())
        .bind(&record.payload)
        .bind(record.attempts)
        .bind(&record.last_error)
        .bind(record.failed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }
}

/// Also used by the outbox so that the jobs are written in its transaction
pub(crate) async fn insert_job<'e, E>(executor: E, job: &NotificationJob) -> anyhow::Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO notification_jobs
        (job_uid, job_type, payload, status, attempts, last_error, created, processed, next_eligible_at, claimed_at)
        VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(job.id.inner_ref())
    .bind(job.job_type.as_str())
    .bind(&job.payload)
    .bind(job.status.as_str())
    .bind(job.attempts)
    .bind(&job.last_error)
    .bind(job.created)
    .bind(job.processed)
    .bind(job.next_eligible_at)
    .bind(job.claimed_at)
    .execute(executor)
    .await?;
    Ok(())
}
