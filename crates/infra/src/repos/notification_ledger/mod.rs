mod inmemory;
mod postgres;

pub use inmemory::InMemoryNotificationLedgerRepo;
pub use postgres::PostgresNotificationLedgerRepo;

use booking_notifier_domain::{LedgerEntry, ID};

/// Read side of the ledger. It is only ever written through the
/// `INotificationOutboxRepo` together with the jobs it accounts for.
#[async_trait::async_trait]
pub trait INotificationLedgerRepo: Send + Sync {
    async fn find_by_booking(&self, booking_id: &ID) -> anyhow::Result<Vec<LedgerEntry>>;
}
