use super::outbox::build_outbox_batch;
use crate::shared::usecase::UseCase;
use booking_notifier_domain::{plan_update, Booking, NotificationJob};
use booking_notifier_infra::NotifierContext;

/// Notifies the recipients affected by an update of a stored booking.
/// Every recipient level change becomes its own job.
#[derive(Debug)]
pub struct NotifyBookingUpdatedUseCase {
    pub previous: Booking,
    pub next: Booking,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    BookingMismatch,
    InvalidPayload(String),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for NotifyBookingUpdatedUseCase {
    type Response = Vec<NotificationJob>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "NotifyBookingUpdated";

    async fn execute(&mut self, ctx: &NotifierContext) -> Result<Self::Response, Self::Errors> {
        if self.previous.id != self.next.id {
            return Err(UseCaseErrors::BookingMismatch);
        }

        let intents = plan_update(&self.previous, &self.next);
        if intents.is_empty() {
            return Ok(Vec::new());
        }

        let now = ctx.sys.get_timestamp_millis();
        let batch = build_outbox_batch(intents, &self.next, ctx, now)
            .map_err(|e| UseCaseErrors::InvalidPayload(e.to_string()))?;
        ctx.repos
            .outbox
            .commit(&batch)
            .await
            .map_err(|_| UseCaseErrors::StorageError)?;

        Ok(batch.jobs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::notification::notify_booking_created::NotifyBookingCreatedUseCase;
    use crate::notification::test_helpers::booking;
    use booking_notifier_domain::NotificationJobType;

    async fn ledger_recipients(ctx: &NotifierContext, booking: &Booking) -> Vec<String> {
        let mut recipients = ctx
            .repos
            .notification_ledger
            .find_by_booking(&booking.id)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.recipient_email)
            .collect::<Vec<_>>();
        recipients.sort();
        recipients
    }

    #[actix_web::main]
    #[test]
    async fn organizer_and_attendee_changes_enqueue_one_job_per_recipient() {
        let ctx = NotifierContext::create_inmemory();
        let previous = booking("o1@example.com", &["a@example.com", "b@example.com"]);
        let mut created = NotifyBookingCreatedUseCase {
            booking: previous.clone(),
        };
        created.execute(&ctx).await.unwrap();

        let mut next = previous.clone();
        next.organizer_email = Some("o2@example.com".into());
        next.attendee_emails = vec!["a@example.com".into(), "c@example.com".into()];
        let mut usecase = NotifyBookingUpdatedUseCase {
            previous: previous.clone(),
            next: next.clone(),
        };
        let jobs = usecase.execute(&ctx).await.unwrap();

        let summary = jobs
            .iter()
            .map(|job| {
                (
                    job.job_type,
                    job.decode_payload().unwrap().recipients.join(","),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                (NotificationJobType::InviteUpdate, "o2@example.com".to_string()),
                (NotificationJobType::InviteCancel, "o1@example.com".to_string()),
                (NotificationJobType::InviteUpdate, "c@example.com".to_string()),
                (NotificationJobType::InviteCancel, "b@example.com".to_string()),
            ]
        );
        // The create job and the four update jobs
        assert_eq!(ctx.repos.notification_jobs.find_all().await.unwrap().len(), 5);
        assert_eq!(
            ledger_recipients(&ctx, &next).await,
            vec!["a@example.com", "c@example.com", "o2@example.com"]
        );
    }

    #[actix_web::main]
    #[test]
    async fn payload_carries_the_new_version() {
        let ctx = NotifierContext::create_inmemory();
        let previous = booking("o@example.com", &["a@example.com"]);
        let mut next = previous.clone();
        next.location = Some("Room 9".into());

        let mut usecase = NotifyBookingUpdatedUseCase {
            previous,
            next: next.clone(),
        };
        let jobs = usecase.execute(&ctx).await.unwrap();

        assert_eq!(jobs.len(), 2);
        assert!(jobs
            .iter()
            .all(|job| job.decode_payload().unwrap().booking == next));
    }

    #[actix_web::main]
    #[test]
    async fn rejects_different_bookings() {
        let ctx = NotifierContext::create_inmemory();
        let mut usecase = NotifyBookingUpdatedUseCase {
            previous: booking("o@example.com", &[]),
            next: booking("o@example.com", &[]),
        };
        assert!(matches!(
            usecase.execute(&ctx).await,
            Err(UseCaseErrors::BookingMismatch)
        ));
    }
}
