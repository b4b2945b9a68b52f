mod booking;
pub mod date;
mod ics;
mod invite;
mod notification;
mod recurrence;
mod shared;

pub use booking::{Booking, BookingDraft};
pub use ics::{build_ics, event_uid, IcsMethod};
pub use invite::{plan_cancel, plan_create, plan_update, InviteIntent, LedgerChange};
pub use notification::{
    DeadLetterRecord, LedgerEntry, NotificationJob, NotificationJobStatus, NotificationJobType,
    NotificationPayload, PayloadError, RenderedContent, RetryDecision, RetryPolicy,
    UnknownVariantError,
};
pub use recurrence::{
    expand, ExpansionOptions, RecurrenceFrequency, RecurrenceRule, RecurrenceRuleInput,
    TimeInstance, ValidationError,
};
pub use shared::entity::{Entity, InvalidIDError, ID};
