use super::{INotificationOutboxRepo, NotificationOutboxBatch};
use crate::repos::notification_job::insert_job;
use sqlx::PgPool;

pub struct PostgresNotificationOutboxRepo {
    pool: PgPool,
}

impl PostgresNotificationOutboxRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl INotificationOutboxRepo for PostgresNotificationOutboxRepo {
    async fn commit(&self, batch: &NotificationOutboxBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;

        for job in &batch.jobs {
            insert_job(&mut *tx, job).await?;
        }
        for entry in &batch.ledger_upserts {
            sqlx::query(
                r#"
                INSERT INTO notification_ledger
                (booking_uid, recipient_email, last_sent_at)
                VALUES($1, $2, $3)
                ON CONFLICT (booking_uid, recipient_email)
                DO UPDATE SET last_sent_at = EXCLUDED.last_sent_at
                "#,
            )
            .bind(entry.booking_id.inner_ref())
            .bind(&entry.recipient_email)
            .bind(entry.last_sent_at)
            .execute(&mut *tx)
            .await?;
        }
        for removal in &batch.ledger_removals {
            sqlx::query(
                r#"
                DELETE FROM notification_ledger AS l
                WHERE l.booking_uid = $1 AND l.recipient_email = $2
                "#,
            )
            .bind(removal.booking_id.inner_ref())
            .bind(&removal.recipient_email)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
