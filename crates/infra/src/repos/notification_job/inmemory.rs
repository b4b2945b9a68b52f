use super::INotificationJobRepo;
use crate::repos::shared::inmemory_repo::*;
use booking_notifier_domain::{DeadLetterRecord, NotificationJob, NotificationJobStatus, ID};
use std::sync::Arc;

pub struct InMemoryNotificationJobRepo {
    tables: Arc<InMemoryNotificationTables>,
}

impl InMemoryNotificationJobRepo {
    pub fn new(tables: Arc<InMemoryNotificationTables>) -> Self {
        Self { tables }
    }
}

fn is_claimed(job: &NotificationJob, job_id: &ID, attempt: i64) -> bool {
    job.id == *job_id
        && job.status == NotificationJobStatus::Processing
        && job.attempts == attempt
}

#[async_trait::async_trait]
impl INotificationJobRepo for InMemoryNotificationJobRepo {
    async fn insert(&self, job: &NotificationJob) -> anyhow::Result<()> {
        insert(job, &self.tables.jobs);
        Ok(())
    }

    async fn find(&self, job_id: &ID) -> Option<NotificationJob> {
        find_by(&self.tables.jobs, |job| job.id == *job_id)
            .into_iter()
            .next()
    }

    async fn find_all(&self) -> anyhow::Result<Vec<NotificationJob>> {
        let mut jobs = find_by(&self.tables.jobs, |_| true);
        jobs.sort_by_key(|job| job.created);
        Ok(jobs)
    }

    async fn claim_due(
        &self,
        now: i64,
        max_attempts: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<NotificationJob>> {
        let mut jobs = lock(&self.tables.jobs);
        // Stable sort so that insertion order breaks ties like the sequence
        // column does in postgres
        let mut due = (0..jobs.len())
            .filter(|&i| jobs[i].is_claimable(now, max_attempts))
            .collect::<Vec<_>>();
        due.sort_by_key(|&i| jobs[i].created);

        let mut claimed = Vec::new();
        for i in due.into_iter().take(limit.max(0) as usize) {
            jobs[i].claim(now);
            claimed.push(jobs[i].clone());
        }
        Ok(claimed)
    }

    async fn find_stale(&self, claimed_before: i64) -> anyhow::Result<Vec<NotificationJob>> {
        Ok(find_by(&self.tables.jobs, |job| {
            job.status == NotificationJobStatus::Processing
                && job.claimed_at.map(|at| at <= claimed_before).unwrap_or(true)
        }))
    }

    async fn mark_sent(&self, job_id: &ID, attempt: i64, now: i64) -> anyhow::Result<bool> {
        let updated = update_many(
            &self.tables.jobs,
            |job| is_claimed(job, job_id, attempt),
            |job| job.mark_sent(now),
        );
        Ok(!updated.is_empty())
    }

    async fn mark_failed(
        &self,
        job_id: &ID,
        attempt: i64,
        error: &str,
        now: i64,
        next_eligible_at: i64,
    ) -> anyhow::Result<bool> {
        let updated = update_many(
            &self.tables.jobs,
            |job| is_claimed(job, job_id, attempt),
            |job| job.mark_failed(error, now, next_eligible_at),
        );
        Ok(!updated.is_empty())
    }

    async fn move_to_dead_letters(
        &self,
        job_id: &ID,
        attempt: i64,
        error: &str,
        now: i64,
    ) -> anyhow::Result<Option<DeadLetterRecord>> {
        let mut jobs = lock(&self.tables.jobs);
        let mut dead_letters = lock(&self.tables.dead_letters);

        let record = find_and_delete_by(&mut *jobs, |job| is_claimed(job, job_id, attempt))
            .into_iter()
            .next()
            .map(|job| job.into_dead_letter(error, now));
        if let Some(record) = &record {
            dead_letters.push(record.clone());
        }
        Ok(record)
    }
}
