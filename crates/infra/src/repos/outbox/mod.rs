mod inmemory;
mod postgres;

pub use inmemory::InMemoryNotificationOutboxRepo;
pub use postgres::PostgresNotificationOutboxRepo;

use booking_notifier_domain::{LedgerEntry, NotificationJob, ID};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerKey {
    pub booking_id: ID,
    pub recipient_email: String,
}

/// Everything a single invite decision writes
#[derive(Debug, Clone, Default)]
pub struct NotificationOutboxBatch {
    pub jobs: Vec<NotificationJob>,
    /// Inserted, or `last_sent_at` refreshed when already present
    pub ledger_upserts: Vec<LedgerEntry>,
    pub ledger_removals: Vec<LedgerKey>,
}

impl NotificationOutboxBatch {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.ledger_upserts.is_empty() && self.ledger_removals.is_empty()
    }
}

/// Writes jobs and ledger changes in one transaction. Either all of a
/// batch is visible afterwards or none of it.
#[async_trait::async_trait]
pub trait INotificationOutboxRepo: Send + Sync {
    async fn commit(&self, batch: &NotificationOutboxBatch) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotifierContext;
    use booking_notifier_domain::{BookingDraft, NotificationJobType, NotificationPayload};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn commits_jobs_and_ledger_together() {
        let ctx = NotifierContext::create_inmemory();
        let start = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let booking = BookingDraft {
            organizer_email: Some("o@example.com".into()),
            attendee_emails: vec!["a@example.com".into()],
            title: "Room 2".into(),
            description: None,
            location: None,
        }
        .into_booking(start, start + chrono::Duration::hours(1));
        let payload = NotificationPayload {
            booking: booking.clone(),
            recipients: booking.recipients(),
            content: None,
        };
        let entry = |email: &str, at: i64| LedgerEntry {
            booking_id: booking.id.clone(),
            recipient_email: email.to_string(),
            last_sent_at: at,
        };

        let batch = NotificationOutboxBatch {
            jobs: vec![NotificationJob::new(NotificationJobType::InviteCreate, &payload, 1).unwrap()],
            ledger_upserts: vec![entry("o@example.com", 1), entry("a@example.com", 1)],
            ledger_removals: vec![],
        };
        ctx.repos.outbox.commit(&batch).await.unwrap();

        let batch = NotificationOutboxBatch {
            jobs: vec![],
            ledger_upserts: vec![entry("a@example.com", 2)],
            ledger_removals: vec![LedgerKey {
                booking_id: booking.id.clone(),
                recipient_email: "o@example.com".into(),
            }],
        };
        ctx.repos.outbox.commit(&batch).await.unwrap();

        let ledger = ctx
            .repos
            .notification_ledger
            .find_by_booking(&booking.id)
            .await
            .unwrap();
        assert_eq!(ledger, vec![entry("a@example.com", 2)]);
        assert_eq!(ctx.repos.notification_jobs.find_all().await.unwrap().len(), 1);
    }
}
