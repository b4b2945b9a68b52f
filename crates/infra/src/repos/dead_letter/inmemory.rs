use super::IDeadLetterRepo;
use crate::repos::shared::inmemory_repo::*;
use booking_notifier_domain::{DeadLetterRecord, ID};
use std::sync::Arc;

pub struct InMemoryDeadLetterRepo {
    tables: Arc<InMemoryNotificationTables>,
}

impl InMemoryDeadLetterRepo {
    pub fn new(tables: Arc<InMemoryNotificationTables>) -> Self {
        Self { tables }
    }
}

#[async_trait::async_trait]
impl IDeadLetterRepo for InMemoryDeadLetterRepo {
    async fn find_all(&self) -> anyhow::Result<Vec<DeadLetterRecord>> {
        let mut records = find_by(&self.tables.dead_letters, |_| true);
        records.reverse();
        records.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        Ok(records)
    }

    async fn find_by_job(&self, job_id: &ID) -> anyhow::Result<Option<DeadLetterRecord>> {
        Ok(
            find_by(&self.tables.dead_letters, |record| {
                record.original_job_id == *job_id
            })
            .into_iter()
            .next(),
        )
    }
}
