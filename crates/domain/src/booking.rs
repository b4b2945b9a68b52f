use crate::recurrence::{expand, ExpansionOptions, RecurrenceRule, ValidationError};
use crate::shared::entity::{Entity, ID};
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A single scheduled booking as seen by the notification pipeline.
///
/// Start and end are wall-clock values and carry no time zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: ID,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub organizer_email: Option<String>,
    pub attendee_emails: Vec<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl Entity for Booking {
    fn id(&self) -> &ID {
        &self.id
    }
}

impl Booking {
    pub fn organizer(&self) -> Option<String> {
        self.organizer_email.as_deref().and_then(normalize_email)
    }

    /// Normalized attendees in their original order, without duplicates.
    /// An entry may hold a whole list as typed into a booking form.
    pub fn attendees(&self) -> Vec<String> {
        self.attendee_emails
            .iter()
            .flat_map(|entry| parse_attendees(entry))
            .unique()
            .collect()
    }

    /// Attendees without the organizer
    pub fn guests(&self) -> Vec<String> {
        let organizer = self.organizer();
        self.attendees()
            .into_iter()
            .filter(|email| Some(email) != organizer.as_ref())
            .collect()
    }

    /// Everybody who should hear about this booking: the organizer first,
    /// then the attendees.
    pub fn recipients(&self) -> Vec<String> {
        self.organizer()
            .into_iter()
            .chain(self.attendees())
            .unique()
            .collect()
    }

    /// Whether anything a recipient sees in the invitation differs
    pub fn details_changed(&self, other: &Booking) -> bool {
        self.start != other.start
            || self.end != other.end
            || self.title != other.title
            || self.description != other.description
            || self.location != other.location
    }
}

/// Trims and lowercases an email address. Blank input yields `None`.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        None
    } else {
        Some(email.to_lowercase())
    }
}

/// Parses a free-form attendee list separated by commas, semicolons
/// or whitespace.
pub fn parse_attendees(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter_map(normalize_email)
        .unique()
        .collect()
}

/// The booking fields shared by every occurrence of a recurring request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub organizer_email: Option<String>,
    pub attendee_emails: Vec<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl BookingDraft {
    pub fn into_booking(self, start: NaiveDateTime, end: NaiveDateTime) -> Booking {
        Booking {
            id: Default::default(),
            start,
            end,
            organizer_email: self.organizer_email,
            attendee_emails: self.attendee_emails,
            title: self.title,
            description: self.description,
            location: self.location,
        }
    }

    /// Creates one `Booking` per occurrence of `rule`. Each of them gets
    /// its own id and is notified independently.
    pub fn materialize(
        &self,
        rule: &RecurrenceRule,
        options: &ExpansionOptions,
    ) -> Result<Vec<Booking>, ValidationError> {
        let instances = expand(rule, options)?;
        Ok(instances
            .into_iter()
            .map(|instance| self.clone().into_booking(instance.start, instance.end))
            .collect())
    }
}
