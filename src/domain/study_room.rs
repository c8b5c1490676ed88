use super::{StudentId, StudyRoomBookingId, StudyRoomId};
use crate::error::{HostelError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct StudyRoom {
    pub id: StudyRoomId,
    pub room_number: String,
    pub capacity: u32,
    #[serde(default)]
    pub facilities: Vec<String>,
    pub floor: i32,
    pub is_available: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum StudyRoomBookingStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl StudyRoomBookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for StudyRoomBookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a wall-clock time given as `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M:%S"))
        .map_err(|_| HostelError::ValidationError(format!("'{input}' is not a time (HH:MM)")))
}

/// A half-open `[start, end)` period within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(HostelError::ValidationError(format!(
                "slot must end after it starts ({} - {})",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Back-to-back slots do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct StudyRoomBooking {
    pub id: StudyRoomBookingId,
    pub student_id: StudentId,
    pub room_id: StudyRoomId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: StudyRoomBookingStatus,
    pub created_at: DateTime<Utc>,
}

impl StudyRoomBooking {
    /// `None` for a stored row whose times are out of order.
    pub fn slot(&self) -> Option<TimeSlot> {
        TimeSlot::new(self.start_time, self.end_time).ok()
    }
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct NewStudyRoomBooking {
    pub student_id: StudentId,
    pub room_id: StudyRoomId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: StudyRoomBookingStatus,
}

/// A study room booking joined with its room.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct StudyRoomBookingListing {
    #[serde(flatten)]
    pub booking: StudyRoomBooking,
    pub study_room: StudyRoom,
}

/// What a student asks for when reserving a study room.
#[derive(Debug, Clone)]
pub struct StudyRoomRequest {
    pub room_id: StudyRoomId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(start: &str, end: &str) -> TimeSlot {
        TimeSlot::new(parse_clock_time(start).unwrap(), parse_clock_time(end).unwrap()).unwrap()
    }

    #[test]
    fn test_overlap() {
        let morning = slot("09:00", "11:00");
        assert!(morning.overlaps(&slot("10:30", "12:00")));
        assert!(morning.overlaps(&slot("09:30", "10:00")));
        assert!(slot("08:00", "13:00").overlaps(&morning));
        assert!(!morning.overlaps(&slot("11:00", "12:00")));
        assert!(!morning.overlaps(&slot("07:00", "09:00")));
    }

    #[test]
    fn test_empty_or_reversed_slot_is_invalid() {
        let nine = parse_clock_time("09:00").unwrap();
        let ten = parse_clock_time("10:00:00").unwrap();
        assert!(TimeSlot::new(nine, nine).is_err());
        assert!(TimeSlot::new(ten, nine).is_err());
        assert_eq!(TimeSlot::new(nine, ten).unwrap().to_string(), "09:00-10:00");
    }

    #[test]
    fn test_parse_clock_time_rejects_garbage() {
        assert!(parse_clock_time("9am").is_err());
        assert!(parse_clock_time("25:00").is_err());
    }

    #[test]
    fn test_booking_row_from_store_json() {
        let json = serde_json::json!({
            "id": "0b6f5bde-0a41-4f4c-9a57-1a3f1d0c2e11",
            "student_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "room_id": "5f0c6a8e-3d0b-4b8c-9d55-2f1b7a4e9c01",
            "date": "2026-03-12",
            "start_time": "14:00:00",
            "end_time": "16:00:00",
            "status": "approved",
            "created_at": "2026-03-10T09:00:00Z",
            "study_room": {
                "id": "5f0c6a8e-3d0b-4b8c-9d55-2f1b7a4e9c01",
                "room_number": "S1",
                "capacity": 6,
                "facilities": ["whiteboard", "projector"],
                "floor": 2,
                "is_available": true
            }
        });

        let listing: StudyRoomBookingListing = serde_json::from_value(json).unwrap();
        assert_eq!(listing.booking.status, StudyRoomBookingStatus::Approved);
        assert_eq!(listing.booking.slot().unwrap(), slot("14:00", "16:00"));
        assert_eq!(listing.study_room.facilities.len(), 2);
    }
}
