use crate::booking::Booking;
use crate::notification::NotificationJobType;
use std::collections::HashSet;

/// What happens to the ledger row of every recipient of an `InviteIntent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    /// Insert the row or refresh its `last_sent_at`
    Record,
    /// The recipient is no longer part of the booking
    Forget,
}

/// A single notification the differ wants to enqueue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteIntent {
    pub job_type: NotificationJobType,
    pub recipients: Vec<String>,
    pub ledger: LedgerChange,
}

impl InviteIntent {
    fn update(recipient: &str) -> Self {
        Self {
            job_type: NotificationJobType::InviteUpdate,
            recipients: vec![recipient.to_string()],
            ledger: LedgerChange::Record,
        }
    }

    fn cancel(recipient: &str) -> Self {
        Self {
            job_type: NotificationJobType::InviteCancel,
            recipients: vec![recipient.to_string()],
            ledger: LedgerChange::Forget,
        }
    }
}

/// Plans the invitation of a newly created booking. Recipients found in
/// `already_notified` are skipped, which makes repeated calls for the same
/// booking produce nothing.
pub fn plan_create(booking: &Booking, already_notified: &[String]) -> Option<InviteIntent> {
    let recipients = booking
        .recipients()
        .into_iter()
        .filter(|r| !already_notified.contains(r))
        .collect::<Vec<_>>();

    if recipients.is_empty() {
        return None;
    }

    Some(InviteIntent {
        job_type: NotificationJobType::InviteCreate,
        recipients,
        ledger: LedgerChange::Record,
    })
}

/// Plans the notifications caused by changing `previous` into `next`.
/// Every recipient level change becomes its own intent.
pub fn plan_update(previous: &Booking, next: &Booking) -> Vec<InviteIntent> {
    let mut intents = Vec::new();
    let mut touched = HashSet::new();

    let prev_guests = previous.guests();
    let next_guests = next.guests();
    let next_organizer = next.organizer();

    if let (Some(old_organizer), Some(new_organizer)) = (previous.organizer(), &next_organizer) {
        if old_organizer != *new_organizer {
            intents.push(InviteIntent::update(new_organizer));
            touched.insert(new_organizer.clone());
            // Stays on the booking as a guest
            if !next_guests.contains(&old_organizer) {
                intents.push(InviteIntent::cancel(&old_organizer));
                touched.insert(old_organizer);
            }
        }
    }

    for added in next_guests.iter().filter(|g| !prev_guests.contains(g)) {
        if touched.insert(added.clone()) {
            intents.push(InviteIntent::update(added));
        }
    }
    for removed in prev_guests
        .iter()
        .filter(|g| !next_guests.contains(g) && Some(*g) != next_organizer.as_ref())
    {
        if touched.insert(removed.clone()) {
            intents.push(InviteIntent::cancel(removed));
        }
    }

    if previous.details_changed(next) {
        let prev_recipients = previous.recipients();
        for retained in next
            .recipients()
            .into_iter()
            .filter(|r| prev_recipients.contains(r))
        {
            if !touched.contains(&retained) {
                intents.push(InviteIntent::update(&retained));
            }
        }
    }

    intents
}

/// Plans the cancellation of a whole booking for everybody who was invited
pub fn plan_cancel(notified: &[String]) -> Vec<InviteIntent> {
    notified.iter().map(|r| InviteIntent::cancel(r)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::booking::BookingDraft;
    use chrono::NaiveDate;

    fn booking(organizer: &str, attendees: &[&str]) -> Booking {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        BookingDraft {
            organizer_email: Some(organizer.to_string()),
            attendee_emails: attendees.iter().map(|a| a.to_string()).collect(),
            title: "Desk 12".into(),
            description: None,
            location: None,
        }
        .into_booking(start, start + chrono::Duration::hours(1))
    }

    fn with(previous: &Booking, organizer: &str, attendees: &[&str]) -> Booking {
        let mut next = previous.clone();
        next.organizer_email = Some(organizer.to_string());
        next.attendee_emails = attendees.iter().map(|a| a.to_string()).collect();
        next
    }

    fn summary(intents: &[InviteIntent]) -> Vec<(NotificationJobType, String)> {
        intents
            .iter()
            .map(|i| (i.job_type, i.recipients.join(",")))
            .collect()
    }

    #[test]
    fn create_invites_everybody_once() {
        let b = booking("o@x.io", &["a@x.io", "b@x.io"]);
        let intent = plan_create(&b, &[]).unwrap();
        assert_eq!(intent.job_type, NotificationJobType::InviteCreate);
        assert_eq!(intent.recipients, vec!["o@x.io", "a@x.io", "b@x.io"]);
        assert_eq!(intent.ledger, LedgerChange::Record);

        let notified = intent.recipients;
        assert!(plan_create(&b, &notified).is_none());
    }

    #[test]
    fn create_skips_only_notified_recipients() {
        let b = booking("o@x.io", &["a@x.io", "b@x.io"]);
        let intent = plan_create(&b, &["o@x.io".to_string()]).unwrap();
        assert_eq!(intent.recipients, vec!["a@x.io", "b@x.io"]);
    }

    #[test]
    fn update_with_organizer_and_attendee_changes() {
        let prev = booking("o1@x.io", &["a@x.io", "b@x.io"]);
        let next = with(&prev, "o2@x.io", &["a@x.io", "c@x.io"]);

        assert_eq!(
            summary(&plan_update(&prev, &next)),
            vec![
                (NotificationJobType::InviteUpdate, "o2@x.io".to_string()),
                (NotificationJobType::InviteCancel, "o1@x.io".to_string()),
                (NotificationJobType::InviteUpdate, "c@x.io".to_string()),
                (NotificationJobType::InviteCancel, "b@x.io".to_string()),
            ]
        );
    }

    #[test]
    fn update_without_changes_is_silent() {
        let prev = booking("o@x.io", &["a@x.io"]);
        let next = with(&prev, " O@x.io", &["A@x.io "]);
        assert!(plan_update(&prev, &next).is_empty());
    }

    #[test]
    fn old_organizer_staying_as_guest_is_not_cancelled() {
        let prev = booking("o1@x.io", &["a@x.io"]);
        let next = with(&prev, "o2@x.io", &["a@x.io", "o1@x.io"]);
        assert_eq!(
            summary(&plan_update(&prev, &next)),
            vec![
                (NotificationJobType::InviteUpdate, "o2@x.io".to_string()),
                (NotificationJobType::InviteUpdate, "o1@x.io".to_string()),
            ]
        );
    }

    #[test]
    fn promoted_guest_is_not_cancelled() {
        let prev = booking("o1@x.io", &["a@x.io", "b@x.io"]);
        let next = with(&prev, "b@x.io", &["a@x.io"]);
        assert_eq!(
            summary(&plan_update(&prev, &next)),
            vec![
                (NotificationJobType::InviteUpdate, "b@x.io".to_string()),
                (NotificationJobType::InviteCancel, "o1@x.io".to_string()),
            ]
        );
    }

    #[test]
    fn detail_changes_update_retained_recipients() {
        let prev = booking("o@x.io", &["a@x.io", "b@x.io"]);
        let mut next = with(&prev, "o@x.io", &["a@x.io", "c@x.io"]);
        next.title = "Desk 14".into();

        assert_eq!(
            summary(&plan_update(&prev, &next)),
            vec![
                (NotificationJobType::InviteUpdate, "c@x.io".to_string()),
                (NotificationJobType::InviteCancel, "b@x.io".to_string()),
                (NotificationJobType::InviteUpdate, "o@x.io".to_string()),
                (NotificationJobType::InviteUpdate, "a@x.io".to_string()),
            ]
        );
    }

    #[test]
    fn cancel_reaches_every_notified_recipient() {
        let intents = plan_cancel(&["o@x.io".to_string(), "a@x.io".to_string()]);
        assert_eq!(intents.len(), 2);
        assert!(intents
            .iter()
            .all(|i| i.job_type == NotificationJobType::InviteCancel
                && i.ledger == LedgerChange::Forget));
    }
}
