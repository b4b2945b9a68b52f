use booking_notifier_domain::{
    Booking, InviteIntent, LedgerChange, LedgerEntry, NotificationJob, NotificationPayload,
    PayloadError,
};
use booking_notifier_infra::{LedgerKey, NotificationOutboxBatch, NotifierContext};

/// Turns the intents of one invite decision into the jobs and ledger
/// changes that have to be committed together. Content is rendered up
/// front so the worker only has to deliver.
pub fn build_outbox_batch(
    intents: Vec<InviteIntent>,
    booking: &Booking,
    ctx: &NotifierContext,
    now: i64,
) -> Result<NotificationOutboxBatch, PayloadError> {
    let mut batch = NotificationOutboxBatch::default();

    for intent in intents {
        let payload = NotificationPayload {
            booking: booking.clone(),
            recipients: intent.recipients.clone(),
            content: Some(ctx.templates.resolve(intent.job_type, booking)),
        };
        batch
            .jobs
            .push(NotificationJob::new(intent.job_type, &payload, now)?);

        for recipient in intent.recipients {
            match intent.ledger {
                LedgerChange::Record => batch.ledger_upserts.push(LedgerEntry {
                    booking_id: booking.id.clone(),
                    recipient_email: recipient,
                    last_sent_at: now,
                }),
                LedgerChange::Forget => batch.ledger_removals.push(LedgerKey {
                    booking_id: booking.id.clone(),
                    recipient_email: recipient,
                }),
            }
        }
    }

    Ok(batch)
}
