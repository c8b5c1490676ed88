use super::{AllocationId, BookingId, RoomId, StudentId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A student's request to be allocated a room.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BookingRequest {
    pub id: BookingId,
    pub student_id: StudentId,
    pub room_id: RoomId,
    pub request_date: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Room {
    pub id: RoomId,
    pub room_number: String,
    pub floor: i32,
    pub capacity: u32,
    #[serde(rename = "type")]
    pub room_type: String,
    pub price_per_month: Decimal,
    /// Mutual-exclusion flag: set only while the room has an active allocation.
    pub is_occupied: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Active,
    Inactive,
}

/// Binding of one student to one room.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RoomAllocation {
    pub id: AllocationId,
    pub student_id: StudentId,
    pub room_id: RoomId,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: AllocationStatus,
}

/// Allocation row as submitted for insertion; the store assigns the id.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct NewAllocation {
    pub student_id: StudentId,
    pub room_id: RoomId,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: AllocationStatus,
}

impl NewAllocation {
    /// An open-ended active allocation starting at `start_date`.
    pub fn active(student_id: StudentId, room_id: RoomId, start_date: DateTime<Utc>) -> Self {
        Self {
            student_id,
            room_id,
            start_date,
            end_date: None,
            status: AllocationStatus::Active,
        }
    }
}

/// A booking request joined with the room it targets.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BookingListing {
    #[serde(flatten)]
    pub booking: BookingRequest,
    pub room: Room,
}

/// An active allocation joined with its room.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AllocatedRoom {
    #[serde(flatten)]
    pub allocation: RoomAllocation,
    pub room: Room,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BookingSort {
    #[default]
    RequestDate,
    RoomNumber,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Filter and ordering for the admin booking list.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
    pub sort: BookingSort,
    pub order: SortOrder,
}

impl BookingQuery {
    pub fn matches(&self, booking: &BookingRequest) -> bool {
        self.status.is_none_or(|status| booking.status == status)
    }

    pub fn compare(&self, a: &BookingListing, b: &BookingListing) -> Ordering {
        let ordering = match self.sort {
            BookingSort::RequestDate => a.booking.request_date.cmp(&b.booking.request_date),
            BookingSort::RoomNumber => a.room.room_number.cmp(&b.room.room_number),
            BookingSort::Status => a.booking.status.as_str().cmp(b.booking.status.as_str()),
        };
        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    /// Sorts `listings` in place and drops rows the status filter excludes.
    pub fn apply(&self, listings: &mut Vec<BookingListing>) {
        listings.retain(|listing| self.matches(&listing.booking));
        listings.sort_by(|a, b| self.compare(a, b));
    }
}
