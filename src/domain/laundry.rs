use super::{LaundryRequestId, StudentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LaundryStatus {
    Pending,
    Processing,
    Ready,
    Collected,
}

impl LaundryStatus {
    /// The status an administrator may move a request to, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Processing),
            Self::Processing => Some(Self::Ready),
            Self::Ready => Some(Self::Collected),
            Self::Collected => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Collected => "collected",
        }
    }
}

impl fmt::Display for LaundryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LaundryRequest {
    pub id: LaundryRequestId,
    pub student_id: StudentId,
    pub room_number: String,
    pub number_of_clothes: u32,
    #[serde(default)]
    pub special_instructions: String,
    pub pickup_time: DateTime<Utc>,
    pub status: LaundryStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct NewLaundryRequest {
    pub student_id: StudentId,
    pub room_number: String,
    pub number_of_clothes: u32,
    pub special_instructions: String,
    pub pickup_time: DateTime<Utc>,
    pub status: LaundryStatus,
}

/// What a student fills in when asking for laundry pickup.
#[derive(Debug, Clone)]
pub struct LaundryOrder {
    pub number_of_clothes: u32,
    pub special_instructions: String,
    pub pickup_time: DateTime<Utc>,
}
