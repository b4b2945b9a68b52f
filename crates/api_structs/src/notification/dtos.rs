use booking_notifier_domain::{DeadLetterRecord, NotificationJobType, ID};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterDTO {
    pub original_job_id: ID,
    pub job_type: NotificationJobType,
    pub attempts: i64,
    pub last_error: String,
    pub failed_at: i64,
    pub payload: String,
}

impl DeadLetterDTO {
    pub fn new(record: DeadLetterRecord) -> Self {
        Self {
            original_job_id: record.original_job_id,
            job_type: record.job_type,
            attempts: record.attempts,
            last_error: record.last_error,
            failed_at: record.failed_at,
            payload: record.payload,
        }
    }
}
