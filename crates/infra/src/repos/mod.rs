mod dead_letter;
mod notification_job;
mod notification_ledger;
mod outbox;
mod shared;

use dead_letter::{IDeadLetterRepo, InMemoryDeadLetterRepo, PostgresDeadLetterRepo};
use notification_job::{
    INotificationJobRepo, InMemoryNotificationJobRepo, PostgresNotificationJobRepo,
};
use notification_ledger::{
    INotificationLedgerRepo, InMemoryNotificationLedgerRepo, PostgresNotificationLedgerRepo,
};
use outbox::{
    INotificationOutboxRepo, InMemoryNotificationOutboxRepo, PostgresNotificationOutboxRepo,
};
use shared::inmemory_repo::InMemoryNotificationTables;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

pub use outbox::{LedgerKey, NotificationOutboxBatch};

#[derive(Clone)]
pub struct Repos {
    pub notification_jobs: Arc<dyn INotificationJobRepo>,
    pub notification_ledger: Arc<dyn INotificationLedgerRepo>,
    pub dead_letters: Arc<dyn IDeadLetterRepo>,
    pub outbox: Arc<dyn INotificationOutboxRepo>,
}

impl Repos {
    pub async fn create_postgres(connection_string: &str) -> anyhow::Result<Self> {
        info!("DB CHECKING CONNECTION ...");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;
        info!("DB CHECKING CONNECTION ... [done]");

        Ok(Self {
            notification_jobs: Arc::new(PostgresNotificationJobRepo::new(pool.clone())),
            notification_ledger: Arc::new(PostgresNotificationLedgerRepo::new(pool.clone())),
            dead_letters: Arc::new(PostgresDeadLetterRepo::new(pool.clone())),
            outbox: Arc::new(PostgresNotificationOutboxRepo::new(pool)),
        })
    }

    pub fn create_inmemory() -> Self {
        let tables = Arc::new(InMemoryNotificationTables::new());
        Self {
            notification_jobs: Arc::new(InMemoryNotificationJobRepo::new(tables.clone())),
            notification_ledger: Arc::new(InMemoryNotificationLedgerRepo::new(tables.clone())),
            dead_letters: Arc::new(InMemoryDeadLetterRepo::new(tables.clone())),
            outbox: Arc::new(InMemoryNotificationOutboxRepo::new(tables)),
        }
    }
}
