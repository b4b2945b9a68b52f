use super::outbox::build_outbox_batch;
use crate::shared::usecase::UseCase;
use booking_notifier_domain::{plan_create, Booking, NotificationJob};
use booking_notifier_infra::NotifierContext;
use tracing::info;

/// Invites everybody on a newly created booking who has not been invited
/// yet. Has to be called after the booking itself is stored.
#[derive(Debug)]
pub struct NotifyBookingCreatedUseCase {
    pub booking: Booking,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    InvalidPayload(String),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for NotifyBookingCreatedUseCase {
    type Response = Vec<NotificationJob>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "NotifyBookingCreated";

    async fn execute(&mut self, ctx: &NotifierContext) -> Result<Self::Response, Self::Errors> {
        let notified = ctx
            .repos
            .notification_ledger
            .find_by_booking(&self.booking.id)
            .await
            .map_err(|_| UseCaseErrors::StorageError)?
            .into_iter()
            .map(|entry| entry.recipient_email)
            .collect::<Vec<_>>();

        let intent = match plan_create(&self.booking, &notified) {
            Some(intent) => intent,
            None => {
                info!(
                    "Everybody on booking {} has already been invited",
                    self.booking.id
                );
                return Ok(Vec::new());
            }
        };

        let now = ctx.sys.get_timestamp_millis();
        let batch = build_outbox_batch(vec![intent], &self.booking, ctx, now)
            .map_err(|e| UseCaseErrors::InvalidPayload(e.to_string()))?;
        ctx.repos
            .outbox
            .commit(&batch)
            .await
            .map_err(|_| UseCaseErrors::StorageError)?;

        Ok(batch.jobs)
    }
}
