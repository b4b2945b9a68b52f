mod inmemory;
mod postgres;

pub use inmemory::InMemoryDeadLetterRepo;
pub use postgres::PostgresDeadLetterRepo;

use booking_notifier_domain::{DeadLetterRecord, ID};

/// Dead letters are created by `INotificationJobRepo::move_to_dead_letters`
/// and are never changed afterwards.
#[async_trait::async_trait]
pub trait IDeadLetterRepo: Send + Sync {
    /// Newest first
    async fn find_all(&self) -> anyhow::Result<Vec<DeadLetterRecord>>;
    async fn find_by_job(&self, job_id: &ID) -> anyhow::Result<Option<DeadLetterRecord>>;
}
