use super::booking::{
    AllocatedRoom, BookingListing, BookingQuery, BookingRequest, BookingStatus, NewAllocation,
    Room, RoomAllocation,
};
use super::laundry::{LaundryRequest, LaundryStatus, NewLaundryRequest};
use super::notification::{ChangeEvent, ChangeKind, NewNotification, Notification, Table};
use super::payment::{Amount, BillingMonth, NewPayment, Payment, PaymentSettlement, PaymentStatus};
use super::phone::PhoneNumber;
use super::study_room::{NewStudyRoomBooking, StudyRoom, StudyRoomBooking, StudyRoomBookingListing};
use super::{
    AllocationId, BookingId, LaundryRequestId, NotificationId, PaymentId, RoomId, StudentId,
    StudyRoomId,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

// Guarded writes return the number of rows they touched. Zero rows with a
// guard present means the expected prior value no longer held.

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn booking(&self, id: BookingId) -> Result<Option<BookingRequest>>;
    async fn booking_with_room(&self, id: BookingId) -> Result<Option<BookingListing>>;
    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<BookingListing>>;
    async fn pending_booking_for(&self, student: StudentId) -> Result<Option<BookingRequest>>;
    async fn set_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        expected: BookingStatus,
    ) -> Result<u64>;
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn room(&self, id: RoomId) -> Result<Option<Room>>;
    /// Always guarded: `is_occupied` is only written when it equals `expected`.
    async fn set_room_occupied(&self, id: RoomId, occupied: bool, expected: bool) -> Result<u64>;
}

#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Must reject a second active allocation for the same room.
    async fn insert_allocation(&self, allocation: NewAllocation) -> Result<RoomAllocation>;
    async fn delete_allocation(&self, id: AllocationId) -> Result<u64>;
    async fn active_allocation_for(&self, student: StudentId) -> Result<Option<AllocatedRoom>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment>;
    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn completed_payment_for(
        &self,
        student: StudentId,
        month: BillingMonth,
    ) -> Result<Option<Payment>>;
    async fn payments_for(&self, student: StudentId) -> Result<Vec<Payment>>;
    async fn settle_payment(
        &self,
        id: PaymentId,
        settlement: &PaymentSettlement,
        expected: PaymentStatus,
    ) -> Result<u64>;
}

#[async_trait]
pub trait LaundryStore: Send + Sync {
    async fn insert_laundry_request(&self, request: NewLaundryRequest) -> Result<LaundryRequest>;
    async fn laundry_request(&self, id: LaundryRequestId) -> Result<Option<LaundryRequest>>;
    /// All requests when `student` is `None`; newest first.
    async fn laundry_requests(&self, student: Option<StudentId>) -> Result<Vec<LaundryRequest>>;
    async fn set_laundry_status(
        &self,
        id: LaundryRequestId,
        status: LaundryStatus,
        expected: LaundryStatus,
    ) -> Result<u64>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;
    /// Newest first.
    async fn notifications_for(&self, student: StudentId) -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, id: NotificationId, owner: StudentId) -> Result<u64>;
    async fn mark_all_notifications_read(&self, owner: StudentId) -> Result<u64>;
}

#[async_trait]
pub trait StudyRoomStore: Send + Sync {
    /// Rooms open for booking, by room number.
    async fn available_study_rooms(&self) -> Result<Vec<StudyRoom>>;
    async fn study_room(&self, id: StudyRoomId) -> Result<Option<StudyRoom>>;
    async fn approved_study_bookings(
        &self,
        room: StudyRoomId,
        date: NaiveDate,
    ) -> Result<Vec<StudyRoomBooking>>;
    async fn insert_study_booking(&self, booking: NewStudyRoomBooking) -> Result<StudyRoomBooking>;
    /// Earliest date first.
    async fn study_bookings_for(&self, student: StudentId) -> Result<Vec<StudyRoomBookingListing>>;
}

/// Everything the workflows need from the persistent store.
pub trait HostelStore:
    BookingStore
    + RoomStore
    + AllocationStore
    + PaymentStore
    + LaundryStore
    + NotificationStore
    + StudyRoomStore
{
}

impl<T> HostelStore for T where
    T: BookingStore
        + RoomStore
        + AllocationStore
        + PaymentStore
        + LaundryStore
        + NotificationStore
        + StudyRoomStore
{
}

pub type HostelStoreRef = Arc<dyn HostelStore>;

/// Row-level change notifications, per table.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, table: Table, kinds: &[ChangeKind]) -> ChangeSubscription;
}

/// A filtered view over the store's change broadcast.
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    table: Table,
    kinds: Vec<ChangeKind>,
}

impl ChangeSubscription {
    pub fn new(receiver: broadcast::Receiver<ChangeEvent>, table: Table, kinds: &[ChangeKind]) -> Self {
        Self {
            receiver,
            table,
            kinds: kinds.to_vec(),
        }
    }

    /// Waits for the next matching event; `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.table == self.table && self.kinds.contains(&event.kind) => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(table = self.table.as_str(), skipped, "change subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// An STK push: ask the gateway to prompt `phone` to authorize `amount`.
#[derive(Debug, Clone, PartialEq)]
pub struct StkPush {
    pub amount: Amount,
    pub phone: PhoneNumber,
    pub account_reference: String,
    pub description: String,
}

/// The gateway's immediate answer to an STK push.
#[derive(Debug, Clone, PartialEq)]
pub struct StkPushAck {
    pub response_code: String,
    pub checkout_request_id: String,
    pub response_description: String,
}

impl StkPushAck {
    pub const ACCEPTED: &'static str = "0";

    pub fn is_accepted(&self) -> bool {
        self.response_code == Self::ACCEPTED
    }
}

/// One observation of a checkout's progress.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollStatus {
    pub terminal: bool,
    pub success: bool,
    pub receipt_code: Option<String>,
    pub description: Option<String>,
}

impl PollStatus {
    pub fn in_progress() -> Self {
        Self::default()
    }

    pub fn confirmed(receipt: impl Into<String>) -> Self {
        Self {
            terminal: true,
            success: true,
            receipt_code: Some(receipt.into()),
            description: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            terminal: true,
            success: false,
            receipt_code: None,
            description: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, push: &StkPush) -> Result<StkPushAck>;
    async fn poll_status(&self, checkout_request_id: &str) -> Result<PollStatus>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Time source and sleeper, injectable so polling can be driven in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

pub type ClockRef = Arc<dyn Clock>;
