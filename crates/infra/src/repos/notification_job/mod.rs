mod inmemory;
mod postgres;

pub use inmemory::InMemoryNotificationJobRepo;
pub(crate) use postgres::insert_job;
pub use postgres::PostgresNotificationJobRepo;

use booking_notifier_domain::{DeadLetterRecord, NotificationJob, ID};

#[async_trait::async_trait]
pub trait INotificationJobRepo: Send + Sync {
    async fn insert(&self, job: &NotificationJob) -> anyhow::Result<()>;
    async fn find(&self, job_id: &ID) -> Option<NotificationJob>;
    /// All active jobs, oldest first
    async fn find_all(&self) -> anyhow::Result<Vec<NotificationJob>>;
    /// Claims at most `limit` pending or failed jobs which are due at `now`
    /// and have attempts left, oldest first. Claimed jobs are returned with
    /// status `processing` and their attempt already counted.
    async fn claim_due(
        &self,
        now: i64,
        max_attempts: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<NotificationJob>>;
    /// Jobs that have been `processing` since `claimed_before` or earlier
    async fn find_stale(&self, claimed_before: i64) -> anyhow::Result<Vec<NotificationJob>>;
    /// Only succeeds while the job is still `processing` under the claim
    /// that counted `attempt`
    async fn mark_sent(&self, job_id: &ID, attempt: i64, now: i64) -> anyhow::Result<bool>;
    /// Only succeeds while the job is still `processing` under the claim
    /// that counted `attempt`
    async fn mark_failed(
        &self,
        job_id: &ID,
        attempt: i64,
        error: &str,
        now: i64,
        next_eligible_at: i64,
    ) -> anyhow::Result<bool>;
    /// Removes a `processing` job from the queue and stores it as a
    /// dead letter in the same transaction. Same claim check as `mark_sent`.
    async fn move_to_dead_letters(
        &self,
        job_id: &ID,
        attempt: i64,
        error: &str,
        now: i64,
    ) -> anyhow::Result<Option<DeadLetterRecord>>;
}
