use super::{NotificationId, StudentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub student_id: StudentId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct NewNotification {
    pub student_id: StudentId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Tables the store exposes change events for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    BookingRequests,
    Rooms,
    RoomAllocations,
    Payments,
    Notifications,
    LaundryRequests,
    StudyRooms,
    StudyRoomBookings,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingRequests => "booking_requests",
            Self::Rooms => "rooms",
            Self::RoomAllocations => "room_allocations",
            Self::Payments => "payments",
            Self::Notifications => "notifications",
            Self::LaundryRequests => "laundry_requests",
            Self::StudyRooms => "study_rooms",
            Self::StudyRoomBookings => "study_room_bookings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change published by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// The row after the change, or the removed row for deletes.
    pub record: serde_json::Value,
}
