use crate::dtos::DeadLetterDTO;
use booking_notifier_domain::DeadLetterRecord;
use serde::{Deserialize, Serialize};

pub mod get_dead_letters {
    use super::*;

    #[derive(Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct APIResponse {
        pub dead_letters: Vec<DeadLetterDTO>,
    }

    impl APIResponse {
        pub fn new(records: Vec<DeadLetterRecord>) -> Self {
            Self {
                dead_letters: records.into_iter().map(DeadLetterDTO::new).collect(),
            }
        }
    }
}
