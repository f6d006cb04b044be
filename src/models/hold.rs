use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::time::hhmm;

/// A checkout session's temporary claim on `[start_time, end_time)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotHold {
    pub id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(skip_serializing)]
    pub owner_token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl SlotHold {
    pub fn is_live(&self, now: NaiveDateTime) -> bool {
        now < self.expires_at
    }

    pub fn is_owned_by(&self, owner_token: &str) -> bool {
        self.owner_token == owner_token
    }
}
