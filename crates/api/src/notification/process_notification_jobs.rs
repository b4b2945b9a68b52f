use crate::shared::usecase::UseCase;
use booking_notifier_domain::{
    build_ics, IcsMethod, NotificationJob, NotificationPayload, RetryDecision,
};
use booking_notifier_infra::{CalendarAttachment, NotifierContext, OutboundMessage};
use tracing::{error, info, warn};

const INTERRUPTED_ERROR: &str = "interrupted while processing";

/// A single run of the notification worker. Claims a batch of due jobs and
/// delivers them one after another.
#[derive(Debug, Default)]
pub struct ProcessNotificationJobsUseCase {}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessedNotificationJobs {
    pub recovered: usize,
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ProcessNotificationJobsUseCase {
    type Response = ProcessedNotificationJobs;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "ProcessNotificationJobs";

    async fn execute(&mut self, ctx: &NotifierContext) -> Result<Self::Response, Self::Errors> {
        let mut processed = ProcessedNotificationJobs::default();

        let now = ctx.sys.get_timestamp_millis();
        let stale = ctx
            .repos
            .notification_jobs
            .find_stale(now - ctx.config.notification_processing_timeout_millis)
            .await
            .map_err(|_| UseCaseErrors::StorageError)?;
        for job in stale {
            warn!(
                "Notification job {} was claimed at {:?} and never finished",
                job.id, job.claimed_at
            );
            processed.recovered += 1;
            self.handle_failure(&job, INTERRUPTED_ERROR, ctx, &mut processed)
                .await;
        }

        let jobs = ctx
            .repos
            .notification_jobs
            .claim_due(
                now,
                ctx.config.notification_max_attempts,
                ctx.config.notification_batch_size,
            )
            .await
            .map_err(|_| UseCaseErrors::StorageError)?;
        processed.claimed = jobs.len();

        for job in jobs {
            self.process_job(&job, ctx, &mut processed).await;
        }

        if processed.claimed > 0 || processed.recovered > 0 {
            info!("Notification worker run finished: {:?}", processed);
        }
        Ok(processed)
    }
}

impl ProcessNotificationJobsUseCase {
    async fn process_job(
        &self,
        job: &NotificationJob,
        ctx: &NotifierContext,
        processed: &mut ProcessedNotificationJobs,
    ) {
        let payload = match job.decode_payload() {
            Ok(payload) => payload,
            Err(e) => {
                // Retrying cannot fix the payload
                self.dead_letter(job, &e.to_string(), ctx, processed).await;
                return;
            }
        };

        let now = ctx.sys.get_timestamp_millis();
        let message = build_message(job, &payload, ctx, now);

        match ctx.mailer.send(&message).await {
            Ok(()) => match ctx
                .repos
                .notification_jobs
                .mark_sent(&job.id, job.attempts, now)
                .await
            {
                Ok(true) => processed.sent += 1,
                Ok(false) => warn!(
                    "Notification job {} was delivered but is no longer claimed",
                    job.id
                ),
                Err(e) => error!(
                    "Unable to mark notification job {} as sent: {:?}",
                    job.id, e
                ),
            },
            Err(e) => {
                self.handle_failure(job, &e.to_string(), ctx, processed)
                    .await
            }
        }
    }

    async fn handle_failure(
        &self,
        job: &NotificationJob,
        error: &str,
        ctx: &NotifierContext,
        processed: &mut ProcessedNotificationJobs,
    ) {
        let now = ctx.sys.get_timestamp_millis();
        match ctx.config.retry_policy().on_failure(job.attempts, now) {
            RetryDecision::RetryAt(next_eligible_at) => {
                warn!(
                    "Notification job {} failed on attempt {}, retrying at {}: {}",
                    job.id, job.attempts, next_eligible_at, error
                );
                match ctx
                    .repos
                    .notification_jobs
                    .mark_failed(&job.id, job.attempts, error, now, next_eligible_at)
                    .await
                {
                    Ok(true) => processed.retried += 1,
                    Ok(false) => warn!("Notification job {} is no longer claimed", job.id),
                    Err(e) => error!(
                        "Unable to mark notification job {} as failed: {:?}",
                        job.id, e
                    ),
                }
            }
            RetryDecision::DeadLetter => self.dead_letter(job, error, ctx, processed).await,
        }
    }

    async fn dead_letter(
        &self,
        job: &NotificationJob,
        error: &str,
        ctx: &NotifierContext,
        processed: &mut ProcessedNotificationJobs,
    ) {
        let now = ctx.sys.get_timestamp_millis();
        match ctx
            .repos
            .notification_jobs
            .move_to_dead_letters(&job.id, job.attempts, error, now)
            .await
        {
            Ok(Some(record)) => {
                error!(
                    job_id = %record.original_job_id,
                    job_type = %record.job_type,
                    attempts = record.attempts,
                    last_error = %record.last_error,
                    "Notification job moved to dead letters"
                );
                processed.dead_lettered += 1;
            }
            Ok(None) => warn!("Notification job {} is no longer claimed", job.id),
            Err(e) => error!(
                "Unable to move notification job {} to dead letters: {:?}",
                job.id, e
            ),
        }
    }
}

fn build_message(
    job: &NotificationJob,
    payload: &NotificationPayload,
    ctx: &NotifierContext,
    now: i64,
) -> OutboundMessage {
    let content = payload
        .content
        .clone()
        .unwrap_or_else(|| ctx.templates.resolve(job.job_type, &payload.booking));
    let method = job.job_type.method();
    let attendees = match method {
        IcsMethod::Request => payload.booking.guests(),
        IcsMethod::Cancel => payload.recipients.clone(),
    };

    OutboundMessage {
        from: ctx.config.mail_from.clone(),
        recipients: payload.recipients.clone(),
        subject: content.subject,
        html_body: content.html_body,
        text_body: content.text_body,
        calendar: Some(CalendarAttachment {
            method,
            filename: "invite.ics".into(),
            content: build_ics(method, &payload.booking, &attendees, now),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::notification::notify_booking_created::NotifyBookingCreatedUseCase;
    use crate::notification::test_helpers::booking;
    use booking_notifier_domain::{NotificationJobStatus, NotificationJobType};
    use booking_notifier_infra::{ISys, InMemoryMailTransport, MockSys};
    use std::sync::Arc;

    const HOUR: i64 = 1000 * 60 * 60;

    struct TestContext {
        ctx: NotifierContext,
        sys: Arc<MockSys>,
        mailer: Arc<InMemoryMailTransport>,
    }

    fn setup() -> TestContext {
        let sys = Arc::new(MockSys::new(1_700_000_000_000));
        let mailer = Arc::new(InMemoryMailTransport::new());
        let ctx = NotifierContext {
            sys: sys.clone(),
            mailer: mailer.clone(),
            ..NotifierContext::create_inmemory()
        };
        TestContext { ctx, sys, mailer }
    }

    async fn enqueue_invite(ctx: &NotifierContext) -> NotificationJob {
        let mut usecase = NotifyBookingCreatedUseCase {
            booking: booking("o@example.com", &["a@example.com", "b@example.com"]),
        };
        usecase.execute(ctx).await.unwrap().remove(0)
    }

    #[actix_web::main]
    #[test]
    async fn delivers_pending_jobs() {
        let TestContext { ctx, mailer, .. } = setup();
        let job = enqueue_invite(&ctx).await;

        let mut usecase = ProcessNotificationJobsUseCase::default();
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.claimed, 1);
        assert_eq!(res.sent, 1);

        let stored = ctx.repos.notification_jobs.find(&job.id).await.unwrap();
        assert_eq!(stored.status, NotificationJobStatus::Sent);
        assert_eq!(stored.attempts, 1);
        assert!(stored.processed.is_some());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].recipients,
            vec!["o@example.com", "a@example.com", "b@example.com"]
        );
        let calendar = sent[0].calendar.as_ref().unwrap();
        assert_eq!(calendar.method, IcsMethod::Request);
        assert!(calendar.content.contains("METHOD:REQUEST"));
        assert!(calendar.content.contains("ATTENDEE;"));

        // Nothing left to do
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res, ProcessedNotificationJobs::default());
    }

    #[actix_web::main]
    #[test]
    async fn a_run_claims_at_most_one_batch_oldest_first() {
        let TestContext {
            mut ctx,
            sys,
            mailer,
        } = setup();
        ctx.config.notification_batch_size = 5;

        let organizers = (0..7)
            .map(|i| format!("o{}@example.com", i))
            .collect::<Vec<_>>();
        for organizer in &organizers {
            let mut usecase = NotifyBookingCreatedUseCase {
                booking: booking(organizer, &[]),
            };
            usecase.execute(&ctx).await.unwrap();
            sys.advance(1);
        }

        let mut usecase = ProcessNotificationJobsUseCase::default();
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.claimed, 5);
        assert_eq!(res.sent, 5);
        let delivered = mailer
            .sent()
            .iter()
            .map(|m| m.recipients[0].clone())
            .collect::<Vec<_>>();
        assert_eq!(delivered, organizers[..5].to_vec());

        let pending = ctx
            .repos
            .notification_jobs
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|j| j.status == NotificationJobStatus::Pending)
            .count();
        assert_eq!(pending, 2);

        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.claimed, 2);
        assert_eq!(res.sent, 2);
        assert_eq!(mailer.sent().len(), 7);
    }

    #[actix_web::main]
    #[test]
    async fn failed_delivery_is_retried_after_backoff() {
        let TestContext { ctx, sys, mailer } = setup();
        let job = enqueue_invite(&ctx).await;
        mailer.fail_next(1);

        let mut usecase = ProcessNotificationJobsUseCase::default();
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.retried, 1);

        let stored = ctx.repos.notification_jobs.find(&job.id).await.unwrap();
        assert_eq!(stored.status, NotificationJobStatus::Failed);
        assert_eq!(stored.attempts, 1);
        assert!(stored.last_error.is_some());
        assert_eq!(
            stored.next_eligible_at,
            sys.get_timestamp_millis() + 1000 * 60 * 2
        );

        // Backoff has not passed yet
        sys.advance(1000 * 60);
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.claimed, 0);

        sys.advance(1000 * 60);
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.sent, 1);
        let stored = ctx.repos.notification_jobs.find(&job.id).await.unwrap();
        assert_eq!(stored.status, NotificationJobStatus::Sent);
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error, None);
    }

    #[actix_web::main]
    #[test]
    async fn job_is_dead_lettered_after_five_failures() {
        let TestContext { ctx, sys, mailer } = setup();
        let job = enqueue_invite(&ctx).await;
        mailer.fail_next(100);

        let mut usecase = ProcessNotificationJobsUseCase::default();
        for _ in 0..4 {
            let res = usecase.execute(&ctx).await.unwrap();
            assert_eq!(res.retried, 1);
            sys.advance(HOUR);
        }
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.dead_lettered, 1);

        assert!(ctx.repos.notification_jobs.find(&job.id).await.is_none());
        let dead_letters = ctx.repos.dead_letters.find_all().await.unwrap();
        assert_eq!(dead_letters.len(), 1);
        assert_eq!(dead_letters[0].original_job_id, job.id);
        assert_eq!(dead_letters[0].attempts, 5);
        assert_eq!(dead_letters[0].job_type, NotificationJobType::InviteCreate);
        assert_eq!(dead_letters[0].payload, job.payload);

        sys.advance(HOUR * 24);
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.claimed, 0);
        assert!(mailer.sent().is_empty());
    }

    #[actix_web::main]
    #[test]
    async fn undecodable_payload_is_dead_lettered_at_once() {
        let TestContext { ctx, sys, .. } = setup();
        let mut job = enqueue_invite(&ctx).await;
        job.id = Default::default();
        job.payload = "{ not json".into();
        job.created = sys.get_timestamp_millis();
        job.next_eligible_at = job.created;
        ctx.repos.notification_jobs.insert(&job).await.unwrap();

        let mut usecase = ProcessNotificationJobsUseCase::default();
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.claimed, 2);
        assert_eq!(res.sent, 1);
        assert_eq!(res.dead_lettered, 1);

        let record = ctx
            .repos
            .dead_letters
            .find_by_job(&job.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.attempts, 1);
        assert!(record.last_error.contains("Malformed"));
    }

    #[actix_web::main]
    #[test]
    async fn recovers_stale_claims() {
        let TestContext { ctx, sys, .. } = setup();
        let job = enqueue_invite(&ctx).await;
        let now = sys.get_timestamp_millis();
        // A worker that crashed after claiming
        ctx.repos
            .notification_jobs
            .claim_due(now, 5, 5)
            .await
            .unwrap();

        let mut usecase = ProcessNotificationJobsUseCase::default();
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.recovered, 0);
        assert_eq!(res.claimed, 0);

        sys.advance(ctx.config.notification_processing_timeout_millis);
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.recovered, 1);
        assert_eq!(res.retried, 1);

        let stored = ctx.repos.notification_jobs.find(&job.id).await.unwrap();
        assert_eq!(stored.status, NotificationJobStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some(INTERRUPTED_ERROR));

        sys.advance(HOUR);
        let res = usecase.execute(&ctx).await.unwrap();
        assert_eq!(res.sent, 1);
    }

    #[actix_web::main]
    #[test]
    async fn cancellation_lists_recipients_as_attendees() {
        let TestContext { ctx, .. } = setup();
        let b = booking("o@example.com", &["a@example.com"]);
        let payload = NotificationPayload {
            booking: b,
            recipients: vec!["x@example.com".into()],
            content: None,
        };
        let job = NotificationJob::new(NotificationJobType::InviteCancel, &payload, 0).unwrap();

        let message = build_message(&job, &payload, &ctx, 0);
        let calendar = message.calendar.unwrap();
        assert_eq!(calendar.method, IcsMethod::Cancel);
        assert!(calendar.content.contains("STATUS:CANCELLED"));
        assert!(calendar.content.contains("mailto:x@example.com"));
        assert!(!calendar.content.contains("RSVP=TRUE:mailto:a@example.com"));
        assert!(message.subject.starts_with("Cancelled"));
    }
}
