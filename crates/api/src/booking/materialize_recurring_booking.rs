use crate::shared::usecase::UseCase;
use booking_notifier_domain::{Booking, BookingDraft, RecurrenceRuleInput, ValidationError};
use booking_notifier_infra::NotifierContext;

/// Expands a recurring booking request into one booking per occurrence.
/// The caller stores the bookings and then notifies each of them on its own.
#[derive(Debug)]
pub struct MaterializeRecurringBookingUseCase {
    pub draft: BookingDraft,
    pub recurrence: RecurrenceRuleInput,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    InvalidRecurrence(ValidationError),
}

#[async_trait::async_trait(?Send)]
impl UseCase for MaterializeRecurringBookingUseCase {
    type Response = Vec<Booking>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "MaterializeRecurringBooking";

    async fn execute(&mut self, ctx: &NotifierContext) -> Result<Self::Response, Self::Errors> {
        let rule = self
            .recurrence
            .parse()
            .map_err(UseCaseErrors::InvalidRecurrence)?;

        self.draft
            .materialize(&rule, &ctx.config.expansion_options())
            .map_err(UseCaseErrors::InvalidRecurrence)
    }
}
