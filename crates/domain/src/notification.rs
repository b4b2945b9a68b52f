use crate::booking::Booking;
use crate::ics::IcsMethod;
use crate::shared::entity::{Entity, ID};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Malformed notification payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown {kind}: `{value}`")]
pub struct UnknownVariantError {
    kind: &'static str,
    value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationJobType {
    InviteCreate,
    InviteUpdate,
    InviteCancel,
}

impl NotificationJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InviteCreate => "invite_create",
            Self::InviteUpdate => "invite_update",
            Self::InviteCancel => "invite_cancel",
        }
    }

    /// Creation and update are both sent as `REQUEST`, calendar clients
    /// tell them apart by the event UID.
    pub fn method(&self) -> IcsMethod {
        match self {
            Self::InviteCreate | Self::InviteUpdate => IcsMethod::Request,
            Self::InviteCancel => IcsMethod::Cancel,
        }
    }
}

impl Display for NotificationJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationJobType {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invite_create" => Ok(Self::InviteCreate),
            "invite_update" => Ok(Self::InviteUpdate),
            "invite_cancel" => Ok(Self::InviteCancel),
            _ => Err(UnknownVariantError {
                kind: "notification job type",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationJobStatus {
    Pending,
    Processing,
    Failed,
    Sent,
}

impl NotificationJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Sent => "sent",
        }
    }
}

impl Display for NotificationJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationJobStatus {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "failed" => Ok(Self::Failed),
            "sent" => Ok(Self::Sent),
            _ => Err(UnknownVariantError {
                kind: "notification job status",
                value: s.to_string(),
            }),
        }
    }
}

/// Subject and bodies of an outbound notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedContent {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// What a `NotificationJob` carries. It is stored as opaque json text in the
/// job row and only decoded by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub booking: Booking,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub content: Option<RenderedContent>,
}

impl NotificationPayload {
    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(payload: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// A pending notification in the durable queue.
///
/// Created by the invite differ with status `Pending` and no attempts, after
/// that it is only mutated by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationJob {
    pub id: ID,
    pub job_type: NotificationJobType,
    pub payload: String,
    pub status: NotificationJobStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created: i64,
    pub processed: Option<i64>,
    /// The job is not claimed before this timestamp, this is how retry
    /// backoff is enforced.
    pub next_eligible_at: i64,
    pub claimed_at: Option<i64>,
}

impl Entity for NotificationJob {
    fn id(&self) -> &ID {
        &self.id
    }
}

impl NotificationJob {
    pub fn new(
        job_type: NotificationJobType,
        payload: &NotificationPayload,
        now: i64,
    ) -> Result<Self, PayloadError> {
        Ok(Self {
            id: Default::default(),
            job_type,
            payload: payload.encode()?,
            status: NotificationJobStatus::Pending,
            attempts: 0,
            last_error: None,
            created: now,
            processed: None,
            next_eligible_at: now,
            claimed_at: None,
        })
    }

    pub fn decode_payload(&self) -> Result<NotificationPayload, PayloadError> {
        NotificationPayload::decode(&self.payload)
    }

    /// Whether the job can be claimed by the worker at `now`
    pub fn is_claimable(&self, now: i64, max_attempts: i64) -> bool {
        matches!(
            self.status,
            NotificationJobStatus::Pending | NotificationJobStatus::Failed
        ) && self.attempts < max_attempts
            && self.next_eligible_at <= now
    }

    /// Marks the job as taken by the worker. The attempt is counted before
    /// any delivery happens so that a crash mid-send is visible.
    pub fn claim(&mut self, now: i64) {
        self.status = NotificationJobStatus::Processing;
        self.attempts += 1;
        self.claimed_at = Some(now);
    }

    pub fn mark_sent(&mut self, now: i64) {
        self.status = NotificationJobStatus::Sent;
        self.processed = Some(now);
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, error: &str, now: i64, next_eligible_at: i64) {
        self.status = NotificationJobStatus::Failed;
        self.last_error = Some(error.to_string());
        self.processed = Some(now);
        self.next_eligible_at = next_eligible_at;
    }

    pub fn into_dead_letter(self, error: &str, now: i64) -> DeadLetterRecord {
        DeadLetterRecord {
            original_job_id: self.id,
            job_type: self.job_type,
            payload: self.payload,
            attempts: self.attempts,
            last_error: error.to_string(),
            failed_at: now,
        }
    }
}

/// Terminal record of a job that ran out of attempts. Never mutated and
/// never picked up again automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub original_job_id: ID,
    pub job_type: NotificationJobType,
    pub payload: String,
    pub attempts: i64,
    pub last_error: String,
    pub failed_at: i64,
}

/// Marks that `recipient_email` has been notified about `booking_id`.
/// There is at most one entry per booking and recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub booking_id: ID,
    pub recipient_email: String,
    pub last_sent_at: i64,
}

impl LedgerEntry {
    pub fn is_for(&self, booking_id: &ID, recipient_email: &str) -> bool {
        self.booking_id == *booking_id && self.recipient_email == recipient_email
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    RetryAt(i64),
    DeadLetter,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: i64,
    pub backoff_base_millis: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_millis: 1000 * 60 * 2, // 2 minutes
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `attempts` failed ones:
    /// base, 2 * base, 4 * base, ...
    pub fn backoff_delay_millis(&self, attempts: i64) -> i64 {
        let exponent = (attempts.max(1) - 1).min(30) as u32;
        self.backoff_base_millis.saturating_mul(1 << exponent)
    }

    pub fn on_failure(&self, attempts: i64, now: i64) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::DeadLetter
        } else {
            RetryDecision::RetryAt(now + self.backoff_delay_millis(attempts))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::booking::BookingDraft;
    use chrono::NaiveDate;

    fn payload() -> NotificationPayload {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let booking = BookingDraft {
            organizer_email: Some("o@example.com".into()),
            attendee_emails: vec!["a@example.com".into()],
            title: "Room 4".into(),
            description: None,
            location: None,
        }
        .into_booking(start, start + chrono::Duration::hours(1));
        NotificationPayload {
            booking,
            recipients: vec!["o@example.com".into(), "a@example.com".into()],
            content: None,
        }
    }

    #[test]
    fn job_types_map_to_methods() {
        assert_eq!(NotificationJobType::InviteCreate.method(), IcsMethod::Request);
        assert_eq!(NotificationJobType::InviteUpdate.method(), IcsMethod::Request);
        assert_eq!(NotificationJobType::InviteCancel.method(), IcsMethod::Cancel);
    }

    #[test]
    fn parses_job_type_and_status() {
        for t in vec![
            NotificationJobType::InviteCreate,
            NotificationJobType::InviteUpdate,
            NotificationJobType::InviteCancel,
        ] {
            assert_eq!(t.as_str().parse::<NotificationJobType>().unwrap(), t);
        }
        assert!("invite_delete".parse::<NotificationJobType>().is_err());
        assert_eq!(
            "processing".parse::<NotificationJobStatus>().unwrap(),
            NotificationJobStatus::Processing
        );
        assert!("done".parse::<NotificationJobStatus>().is_err());
    }

    #[test]
    fn new_job_is_pending_and_claimable() {
        let payload = payload();
        let job = NotificationJob::new(NotificationJobType::InviteCreate, &payload, 100).unwrap();
        assert_eq!(job.status, NotificationJobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.is_claimable(100, 5));
        assert!(!job.is_claimable(99, 5));
        assert_eq!(job.decode_payload().unwrap(), payload);
    }

    #[test]
    fn job_lifecycle() {
        let mut job =
            NotificationJob::new(NotificationJobType::InviteUpdate, &payload(), 100).unwrap();
        job.claim(200);
        assert_eq!(job.status, NotificationJobStatus::Processing);
        assert_eq!(job.attempts, 1);
        assert!(!job.is_claimable(200, 5));

        job.mark_failed("smtp down", 210, 500);
        assert_eq!(job.status, NotificationJobStatus::Failed);
        assert!(!job.is_claimable(499, 5));
        assert!(job.is_claimable(500, 5));
        assert!(!job.is_claimable(500, 1));

        job.claim(500);
        job.mark_sent(510);
        assert_eq!(job.status, NotificationJobStatus::Sent);
        assert_eq!(job.attempts, 2);
        assert_eq!(job.last_error, None);
        assert_eq!(job.processed, Some(510));
        assert!(!job.is_claimable(10_000, 5));
    }

    #[test]
    fn dead_letter_keeps_job_fields() {
        let mut job =
            NotificationJob::new(NotificationJobType::InviteCancel, &payload(), 100).unwrap();
        job.claim(200);
        let id = job.id.clone();
        let payload = job.payload.clone();
        let record = job.into_dead_letter("mailbox full", 300);
        assert_eq!(record.original_job_id, id);
        assert_eq!(record.job_type, NotificationJobType::InviteCancel);
        assert_eq!(record.payload, payload);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.last_error, "mailbox full");
        assert_eq!(record.failed_at, 300);
    }

    #[test]
    fn rejects_malformed_payload() {
        assert!(NotificationPayload::decode("{\"booking\": 1}").is_err());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        let minute = 1000 * 60;
        assert_eq!(policy.backoff_delay_millis(1), 2 * minute);
        assert_eq!(policy.backoff_delay_millis(2), 4 * minute);
        assert_eq!(policy.backoff_delay_millis(3), 8 * minute);
        assert_eq!(policy.backoff_delay_millis(4), 16 * minute);
    }

    #[test]
    fn dead_letters_once_attempts_are_exhausted() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.on_failure(1, 1000),
            RetryDecision::RetryAt(1000 + 2 * 60 * 1000)
        );
        assert_eq!(policy.on_failure(5, 1000), RetryDecision::DeadLetter);
        assert_eq!(policy.on_failure(6, 1000), RetryDecision::DeadLetter);
    }
}
