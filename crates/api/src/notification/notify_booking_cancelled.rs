use super::outbox::build_outbox_batch;
use crate::shared::usecase::UseCase;
use booking_notifier_domain::{plan_cancel, Booking, NotificationJob};
use booking_notifier_infra::NotifierContext;

/// Sends a cancellation to everybody who was invited to a booking that
/// has been deleted
#[derive(Debug)]
pub struct NotifyBookingCancelledUseCase {
    pub booking: Booking,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    InvalidPayload(String),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for NotifyBookingCancelledUseCase {
    type Response = Vec<NotificationJob>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "NotifyBookingCancelled";

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

        let intents = plan_cancel(&notified);
        if intents.is_empty() {
            return Ok(Vec::new());
        }

        let now = ctx.sys.get_timestamp_millis();
        let batch = build_outbox_batch(intents, &self.booking, ctx, now)
            .map_err(|e| UseCaseErrors::InvalidPayload(e.to_string()))?;
        ctx.repos
            .outbox
            .commit(&batch)
            .await
            .map_err(|_| UseCaseErrors::StorageError)?;

        Ok(batch.jobs)
    }
}
