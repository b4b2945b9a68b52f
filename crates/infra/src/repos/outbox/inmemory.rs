use super::{INotificationOutboxRepo, NotificationOutboxBatch};
use crate::repos::shared::inmemory_repo::*;
use std::sync::Arc;

pub struct InMemoryNotificationOutboxRepo {
    tables: Arc<InMemoryNotificationTables>,
}

impl InMemoryNotificationOutboxRepo {
    pub fn new(tables: Arc<InMemoryNotificationTables>) -> Self {
        Self { tables }
    }
}

#[async_trait::async_trait]
impl INotificationOutboxRepo for InMemoryNotificationOutboxRepo {
    async fn commit(&self, batch: &NotificationOutboxBatch) -> anyhow::Result<()> {
        let mut jobs = lock(&self.tables.jobs);
        let mut ledger = lock(&self.tables.ledger);

        jobs.extend(batch.jobs.iter().cloned());
        for upsert in &batch.ledger_upserts {
            match ledger
                .iter_mut()
                .find(|e| e.is_for(&upsert.booking_id, &upsert.recipient_email))
            {
                Some(existing) => existing.last_sent_at = upsert.last_sent_at,
                None => ledger.push(upsert.clone()),
            }
        }
        for removal in &batch.ledger_removals {
            find_and_delete_by(&mut *ledger, |e| {
                e.is_for(&removal.booking_id, &removal.recipient_email)
            });
        }
        Ok(())
    }
}
