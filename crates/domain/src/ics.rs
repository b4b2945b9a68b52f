//! Calendar interchange (RFC 5545) documents for booking notifications.

use crate::booking::Booking;
use crate::shared::entity::ID;
use chrono::{TimeZone, Utc};
use icalendar::{Calendar, CalendarDateTime, Component, Event, EventLike, Property};
use serde::{Deserialize, Serialize};

const PRODID: &str = "-//Booking Notifier//Notifications//EN";
const UID_DOMAIN: &str = "booking-notifier";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IcsMethod {
    Request,
    Cancel,
}

impl IcsMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Cancel => "CANCEL",
        }
    }
}

/// The UID calendar clients use to correlate a create, its updates and
/// its cancellation. Only depends on the booking id.
pub fn event_uid(booking_id: &ID) -> String {
    format!("{}@{}", booking_id, UID_DOMAIN)
}

/// Builds the calendar document attached to a notification.
///
/// `stamp_millis` is the creation time of the document and only ends up in
/// `DTSTAMP`. Start and end are written as floating local time since they
/// already are wall-clock values.
pub fn build_ics(
    method: IcsMethod,
    booking: &Booking,
    attendees: &[String],
    stamp_millis: i64,
) -> String {
    let mut event = Event::new();
    event
        .uid(&event_uid(&booking.id))
        .summary(&booking.title)
        .starts(CalendarDateTime::Floating(booking.start))
        .ends(CalendarDateTime::Floating(booking.end))
        .add_property("DTSTAMP", format_utc_stamp(stamp_millis));

    if let Some(description) = non_blank(&booking.description) {
        event.description(description);
    }
    if let Some(location) = non_blank(&booking.location) {
        event.location(location);
    }
    if let Some(organizer) = booking.organizer() {
        event.append_property(Property::new("ORGANIZER", format!("mailto:{}", organizer)));
    }
    for attendee in attendees {
        let mut prop = Property::new("ATTENDEE", format!("mailto:{}", attendee));
        prop.add_parameter("RSVP", "TRUE");
        event.append_multi_property(prop);
    }
    if method == IcsMethod::Cancel {
        event.add_property("STATUS", "CANCELLED");
    }

    let mut calendar = Calendar::new();
    calendar
        .append_property(Property::new("METHOD", method.as_str()))
        .push(event.done());

    with_own_prodid(&calendar.to_string())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn format_utc_stamp(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(stamp) => stamp.format("%Y%m%dT%H%M%SZ").to_string(),
        None => "19700101T000000Z".to_string(),
    }
}

// icalendar writes its own PRODID
fn with_own_prodid(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(PRODID);
        } else {
            result.push_str(line);
        }
        result.push_str("\r\n");
    }
    result
}
