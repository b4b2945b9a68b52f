use super::IDeadLetterRepo;
use booking_notifier_domain::{DeadLetterRecord, NotificationJobType, ID};
use sqlx::{types::Uuid, FromRow, PgPool};
use std::convert::TryFrom;

pub struct PostgresDeadLetterRepo {
    pool: PgPool,
}

impl PostgresDeadLetterRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DeadLetterRaw {
    original_job_uid: Uuid,
    job_type: String,
    payload: String,
    attempts: i64,
    last_error: String,
    failed_at: i64,
}

impl TryFrom<DeadLetterRaw> for DeadLetterRecord {
    type Error = anyhow::Error;

    fn try_from(raw: DeadLetterRaw) -> anyhow::Result<Self> {
        Ok(Self {
            original_job_id: raw.original_job_uid.into(),
            job_type: raw.job_type.parse::<NotificationJobType>()?,
            payload: raw.payload,
            attempts: raw.attempts,
            last_error: raw.last_error,
            failed_at: raw.failed_at,
        })
    }
}

#[async_trait::async_trait]
impl IDeadLetterRepo for PostgresDeadLetterRepo {
    async fn find_all(&self) -> anyhow::Result<Vec<DeadLetterRecord>> {
        let rows: Vec<DeadLetterRaw> = sqlx::query_as(
            r#"
            SELECT * FROM notification_dead_letters
            ORDER BY failed_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DeadLetterRecord::try_from).collect()
    }

    async fn find_by_job(&self, job_id: &ID) -> anyhow::Result<Option<DeadLetterRecord>> {
        let row: Option<DeadLetterRaw> = sqlx::query_as(
            r#"
            SELECT * FROM notification_dead_letters AS d
            WHERE d.original_job_uid = $1
            "#,
        )
        .bind(job_id.inner_ref())
        .fetch_optional(&self.pool)
        .await?;
        row.map(DeadLetterRecord::try_from).transpose()
    }
}
