mod get_dead_letters;
pub mod notify_booking_cancelled;
pub mod notify_booking_created;
pub mod notify_booking_updated;
mod outbox;
pub mod process_notification_jobs;

use actix_web::web;
use get_dead_letters::get_dead_letters_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/notifications/dead-letters",
        web::get().to(get_dead_letters_controller),
    );
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use booking_notifier_domain::{Booking, BookingDraft};
    use chrono::NaiveDate;

    pub fn booking(organizer: &str, attendees: &[&str]) -> Booking {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        BookingDraft {
            organizer_email: Some(organizer.to_string()),
            attendee_emails: attendees.iter().map(|a| a.to_string()).collect(),
            title: "Meeting room 3".into(),
            description: None,
            location: None,
        }
        .into_booking(start, start + chrono::Duration::hours(1))
    }
}
