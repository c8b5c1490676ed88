use crate::application::payment::{PaymentOutcome, Resolution};
use crate::application::residence::RoomStatus;
use crate::domain::booking::BookingListing;
use crate::domain::laundry::LaundryRequest;
use crate::domain::notification::Notification;
use crate::domain::payment::Payment;
use crate::domain::study_room::{StudyRoom, StudyRoomBookingListing};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Writes workflow results as CSV to any `Write` sink (e.g., Stdout).
///
/// Each report writes its own header row; one writer per report.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

#[derive(Serialize)]
struct BookingRow<'a> {
    booking: String,
    student: String,
    room: &'a str,
    floor: i32,
    room_type: &'a str,
    price_per_month: Decimal,
    requested: String,
    status: &'static str,
}

#[derive(Serialize)]
struct PaymentRow<'a> {
    payment: String,
    month: String,
    amount: Decimal,
    status: &'static str,
    reference: &'a str,
    receipt: &'a str,
    date: String,
}

#[derive(Serialize)]
struct OutcomeRow<'a> {
    payment: String,
    reference: &'a str,
    status: &'static str,
    receipt: &'a str,
    detail: String,
}

#[derive(Serialize)]
struct RoomStatusRow<'a> {
    status: &'static str,
    room: &'a str,
    floor: Option<i32>,
    since: String,
}

#[derive(Serialize)]
struct LaundryRow<'a> {
    request: String,
    room: &'a str,
    clothes: u32,
    pickup: String,
    status: &'static str,
    instructions: &'a str,
}

#[derive(Serialize)]
struct NotificationRow<'a> {
    notification: String,
    #[serde(rename = "type")]
    kind: &'a str,
    title: &'a str,
    message: &'a str,
    read: bool,
    created: String,
}

#[derive(Serialize)]
struct StudyRoomRow<'a> {
    study_room: String,
    room: &'a str,
    floor: i32,
    capacity: u32,
    facilities: String,
}

#[derive(Serialize)]
struct StudyBookingRow<'a> {
    booking: String,
    room: &'a str,
    date: String,
    start: String,
    end: String,
    status: &'static str,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_bookings(&mut self, listings: &[BookingListing]) -> Result<()> {
        for listing in listings {
            self.writer.serialize(BookingRow {
                booking: listing.booking.id.to_string(),
                student: listing.booking.student_id.to_string(),
                room: &listing.room.room_number,
                floor: listing.room.floor,
                room_type: &listing.room.room_type,
                price_per_month: listing.room.price_per_month,
                requested: timestamp(listing.booking.request_date),
                status: listing.booking.status.as_str(),
            })?;
        }
        self.finish()
    }

    pub fn write_payments(&mut self, payments: &[Payment]) -> Result<()> {
        for payment in payments {
            self.writer.serialize(PaymentRow {
                payment: payment.id.to_string(),
                month: payment.month.to_string(),
                amount: payment.amount.value(),
                status: payment.status.as_str(),
                reference: &payment.reference_number,
                receipt: payment.transaction_code.as_deref().unwrap_or(""),
                date: timestamp(payment.payment_date),
            })?;
        }
        self.finish()
    }

    pub fn write_outcome(&mut self, outcome: &PaymentOutcome) -> Result<()> {
        let detail = match &outcome.resolution {
            Resolution::Confirmed(_) => String::new(),
            Resolution::Declined(reason) => reason.clone(),
            Resolution::TimedOut(after) => {
                format!("no confirmation after {}s", after.as_secs())
            }
        };
        self.writer.serialize(OutcomeRow {
            payment: outcome.payment.id.to_string(),
            reference: &outcome.payment.reference_number,
            status: outcome.payment.status.as_str(),
            receipt: outcome.payment.transaction_code.as_deref().unwrap_or(""),
            detail,
        })?;
        self.finish()
    }

    pub fn write_room_status(&mut self, status: &RoomStatus) -> Result<()> {
        let row = match status {
            RoomStatus::Allocated(allocated) => RoomStatusRow {
                status: "allocated",
                room: &allocated.room.room_number,
                floor: Some(allocated.room.floor),
                since: timestamp(allocated.allocation.start_date),
            },
            RoomStatus::PendingBooking(booking) => RoomStatusRow {
                status: "pending",
                room: "",
                floor: None,
                since: timestamp(booking.request_date),
            },
            RoomStatus::Unassigned => RoomStatusRow {
                status: "unassigned",
                room: "",
                floor: None,
                since: String::new(),
            },
        };
        self.writer.serialize(row)?;
        self.finish()
    }

    pub fn write_laundry(&mut self, requests: &[LaundryRequest]) -> Result<()> {
        for request in requests {
            self.writer.serialize(LaundryRow {
                request: request.id.to_string(),
                room: &request.room_number,
                clothes: request.number_of_clothes,
                pickup: timestamp(request.pickup_time),
                status: request.status.as_str(),
                instructions: &request.special_instructions,
            })?;
        }
        self.finish()
    }

    pub fn write_notifications(&mut self, notifications: &[Notification]) -> Result<()> {
        for notification in notifications {
            self.write_notification(notification)?;
        }
        self.finish()
    }

    /// Writes and flushes a single row, for live feeds.
    pub fn write_notification(&mut self, notification: &Notification) -> Result<()> {
        self.writer.serialize(NotificationRow {
            notification: notification.id.to_string(),
            kind: &notification.kind,
            title: &notification.title,
            message: &notification.message,
            read: notification.read,
            created: timestamp(notification.created_at),
        })?;
        self.finish()
    }

    pub fn write_study_rooms(&mut self, rooms: &[StudyRoom]) -> Result<()> {
        for room in rooms {
            self.writer.serialize(StudyRoomRow {
                study_room: room.id.to_string(),
                room: &room.room_number,
                floor: room.floor,
                capacity: room.capacity,
                facilities: room.facilities.join("; "),
            })?;
        }
        self.finish()
    }

    pub fn write_study_bookings(&mut self, listings: &[StudyRoomBookingListing]) -> Result<()> {
        for listing in listings {
            self.writer.serialize(StudyBookingRow {
                booking: listing.booking.id.to_string(),
                room: &listing.study_room.room_number,
                date: listing.booking.date.to_string(),
                start: listing.booking.start_time.format("%H:%M").to_string(),
                end: listing.booking.end_time.format("%H:%M").to_string(),
                status: listing.booking.status.as_str(),
            })?;
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
