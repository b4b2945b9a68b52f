use super::INotificationLedgerRepo;
use booking_notifier_domain::{LedgerEntry, ID};
use sqlx::{types::Uuid, FromRow, PgPool};

pub struct PostgresNotificationLedgerRepo {
    pool: PgPool,
}

impl PostgresNotificationLedgerRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct LedgerEntryRaw {
    booking_uid: Uuid,
    recipient_email: String,
    last_sent_at: i64,
}

impl From<LedgerEntryRaw> for LedgerEntry {
    fn from(raw: LedgerEntryRaw) -> Self {
        Self {
            booking_id: raw.booking_uid.into(),
            recipient_email: raw.recipient_email,
            last_sent_at: raw.last_sent_at,
        }
    }
}

#[async_trait::async_trait]
impl INotificationLedgerRepo for PostgresNotificationLedgerRepo {
    async fn find_by_booking(&self, booking_id: &ID) -> anyhow::Result<Vec<LedgerEntry>> {
        let rows: Vec<LedgerEntryRaw> = sqlx::query_as(
            r#"
            SELECT * FROM notification_ledger AS l
            WHERE l.booking_uid = $1
            ORDER BY l.last_sent_at, l.recipient_email
            "#,
        )
        .bind(booking_id.inner_ref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.into()).collect())
    }
}
