use super::INotificationLedgerRepo;
use crate::repos::shared::inmemory_repo::*;
use booking_notifier_domain::{LedgerEntry, ID};
use std::sync::Arc;

pub struct InMemoryNotificationLedgerRepo {
    tables: Arc<InMemoryNotificationTables>,
}

impl InMemoryNotificationLedgerRepo {
    pub fn new(tables: Arc<InMemoryNotificationTables>) -> Self {
        Self { tables }
    }
}

#[async_trait::async_trait]
impl INotificationLedgerRepo for InMemoryNotificationLedgerRepo {
    async fn find_by_booking(&self, booking_id: &ID) -> anyhow::Result<Vec<LedgerEntry>> {
        Ok(find_by(&self.tables.ledger, |entry| {
            entry.booking_id == *booking_id
        }))
    }
}
