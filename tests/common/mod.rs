#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hostel::domain::booking::{
    AllocatedRoom, BookingListing, BookingQuery, BookingRequest, BookingStatus, NewAllocation,
    Room, RoomAllocation,
};
use hostel::domain::laundry::{LaundryRequest, LaundryStatus, NewLaundryRequest};
use hostel::domain::notification::{NewNotification, Notification};
use hostel::domain::payment::{
    BillingMonth, NewPayment, Payment, PaymentSettlement, PaymentStatus,
};
use hostel::domain::ports::{
    AllocationStore, BookingStore, HostelStoreRef, LaundryStore, NotificationStore, PaymentStore,
    RoomStore, StudyRoomStore,
};
use hostel::domain::study_room::{
    NewStudyRoomBooking, StudyRoom, StudyRoomBooking, StudyRoomBookingListing,
};
use hostel::domain::{
    AllocationId, BookingId, LaundryRequestId, NotificationId, PaymentId, RoomId, StudentId,
    StudyRoomId,
};
use hostel::error::{HostelError, Result};
use hostel::infrastructure::clock::ManualClock;
use hostel::infrastructure::in_memory::InMemoryStore;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
}

pub fn clock() -> ManualClock {
    ManualClock::new(start_time())
}

pub fn room(number: &str) -> Room {
    Room {
        id: RoomId::new(),
        room_number: number.to_string(),
        floor: 1,
        capacity: 1,
        room_type: "single".to_string(),
        price_per_month: dec!(4500),
        is_occupied: false,
    }
}

pub fn pending_booking(student: StudentId, room: &Room, day: u32) -> BookingRequest {
    BookingRequest {
        id: BookingId::new(),
        student_id: student,
        room_id: room.id,
        request_date: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
        status: BookingStatus::Pending,
        notes: None,
    }
}

/// A store holding room R101 and two pending bookings (B1, B2) for it.
pub struct Hostel {
    pub store: InMemoryStore,
    pub r101: Room,
    pub b1: BookingRequest,
    pub b2: BookingRequest,
}

pub async fn seeded() -> Hostel {
    let store = InMemoryStore::new();
    let r101 = room("R101");
    let b1 = pending_booking(StudentId::new(), &r101, 1);
    let b2 = pending_booking(StudentId::new(), &r101, 2);
    store.put_room(r101.clone()).await.unwrap();
    store.put_booking(b1.clone()).await.unwrap();
    store.put_booking(b2.clone()).await.unwrap();
    Hostel {
        store,
        r101,
        b1,
        b2,
    }
}

/// Gives `student` an active allocation in a fresh room.
pub async fn allocate(store: &InMemoryStore, student: StudentId, number: &str) -> Room {
    let mut room = room(number);
    room.is_occupied = true;
    store.put_room(room.clone()).await.unwrap();
    store
        .insert_allocation(NewAllocation::active(student, room.id, start_time()))
        .await
        .unwrap();
    room
}

pub async fn booking_status(store: &InMemoryStore, id: BookingId) -> BookingStatus {
    store.booking(id).await.unwrap().unwrap().status
}

pub async fn room_occupied(store: &InMemoryStore, id: RoomId) -> bool {
    store.room(id).await.unwrap().unwrap().is_occupied
}

/// Wraps an [`InMemoryStore`] and injects failures at chosen writes.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    fail_allocation_insert: Arc<AtomicBool>,
    fail_room_update: Arc<AtomicBool>,
    fail_payment_insert: Arc<AtomicBool>,
    occupy_after_fetch: Arc<AtomicBool>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn failing_allocation_insert(self) -> Self {
        self.fail_allocation_insert.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_room_update(self) -> Self {
        self.fail_room_update.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_payment_insert(self) -> Self {
        self.fail_payment_insert.store(true, Ordering::SeqCst);
        self
    }

    /// Another approval takes the room right after the booking is read.
    pub fn occupying_after_fetch(self) -> Self {
        self.occupy_after_fetch.store(true, Ordering::SeqCst);
        self
    }

    pub fn shared(&self) -> HostelStoreRef {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl BookingStore for FaultyStore {
    async fn booking(&self, id: BookingId) -> Result<Option<BookingRequest>> {
        self.inner.booking(id).await
    }

    async fn booking_with_room(&self, id: BookingId) -> Result<Option<BookingListing>> {
        let listing = self.inner.booking_with_room(id).await?;
        if let Some(listing) = &listing
            && self.occupy_after_fetch.swap(false, Ordering::SeqCst)
        {
            self.inner
                .set_room_occupied(listing.room.id, true, false)
                .await?;
        }
        Ok(listing)
    }

    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<BookingListing>> {
        self.inner.list_bookings(query).await
    }

    async fn pending_booking_for(&self, student: StudentId) -> Result<Option<BookingRequest>> {
        self.inner.pending_booking_for(student).await
    }

    async fn set_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        expected: BookingStatus,
    ) -> Result<u64> {
        self.inner.set_booking_status(id, status, expected).await
    }
}

#[async_trait]
impl RoomStore for FaultyStore {
    async fn room(&self, id: RoomId) -> Result<Option<Room>> {
        self.inner.room(id).await
    }

    async fn set_room_occupied(&self, id: RoomId, occupied: bool, expected: bool) -> Result<u64> {
        if occupied && self.fail_room_update.load(Ordering::SeqCst) {
            return Err(HostelError::WriteError("rooms: connection reset".to_string()));
        }
        self.inner.set_room_occupied(id, occupied, expected).await
    }
}

#[async_trait]
impl AllocationStore for FaultyStore {
    async fn insert_allocation(&self, allocation: NewAllocation) -> Result<RoomAllocation> {
        if self.fail_allocation_insert.load(Ordering::SeqCst) {
            return Err(HostelError::WriteError(
                "room_allocations: permission denied".to_string(),
            ));
        }
        self.inner.insert_allocation(allocation).await
    }

    async fn delete_allocation(&self, id: AllocationId) -> Result<u64> {
        self.inner.delete_allocation(id).await
    }

    async fn active_allocation_for(&self, student: StudentId) -> Result<Option<AllocatedRoom>> {
        self.inner.active_allocation_for(student).await
    }
}

#[async_trait]
impl PaymentStore for FaultyStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        if self.fail_payment_insert.load(Ordering::SeqCst) {
            return Err(HostelError::StoreError("payments: connection reset".to_string()));
        }
        self.inner.insert_payment(payment).await
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.inner.payment(id).await
    }

    async fn completed_payment_for(
        &self,
        student: StudentId,
        month: BillingMonth,
    ) -> Result<Option<Payment>> {
        self.inner.completed_payment_for(student, month).await
    }

    async fn payments_for(&self, student: StudentId) -> Result<Vec<Payment>> {
        self.inner.payments_for(student).await
    }

    async fn settle_payment(
        &self,
        id: PaymentId,
        settlement: &PaymentSettlement,
        expected: PaymentStatus,
    ) -> Result<u64> {
        self.inner.settle_payment(id, settlement, expected).await
    }
}

#[async_trait]
impl LaundryStore for FaultyStore {
    async fn insert_laundry_request(&self, request: NewLaundryRequest) -> Result<LaundryRequest> {
        self.inner.insert_laundry_request(request).await
    }

    async fn laundry_request(&self, id: LaundryRequestId) -> Result<Option<LaundryRequest>> {
        self.inner.laundry_request(id).await
    }

    async fn laundry_requests(&self, student: Option<StudentId>) -> Result<Vec<LaundryRequest>> {
        self.inner.laundry_requests(student).await
    }

    async fn set_laundry_status(
        &self,
        id: LaundryRequestId,
        status: LaundryStatus,
        expected: LaundryStatus,
    ) -> Result<u64> {
        self.inner.set_laundry_status(id, status, expected).await
    }
}

#[async_trait]
impl NotificationStore for FaultyStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        self.inner.insert_notification(notification).await
    }

    async fn notifications_for(&self, student: StudentId) -> Result<Vec<Notification>> {
        self.inner.notifications_for(student).await
    }

    async fn mark_notification_read(&self, id: NotificationId, owner: StudentId) -> Result<u64> {
        self.inner.mark_notification_read(id, owner).await
    }

    async fn mark_all_notifications_read(&self, owner: StudentId) -> Result<u64> {
        self.inner.mark_all_notifications_read(owner).await
    }
}

#[async_trait]
impl StudyRoomStore for FaultyStore {
    async fn available_study_rooms(&self) -> Result<Vec<StudyRoom>> {
        self.inner.available_study_rooms().await
    }

    async fn study_room(&self, id: StudyRoomId) -> Result<Option<StudyRoom>> {
        self.inner.study_room(id).await
    }

    async fn approved_study_bookings(
        &self,
        room: StudyRoomId,
        date: NaiveDate,
    ) -> Result<Vec<StudyRoomBooking>> {
        self.inner.approved_study_bookings(room, date).await
    }

    async fn insert_study_booking(&self, booking: NewStudyRoomBooking) -> Result<StudyRoomBooking> {
        self.inner.insert_study_booking(booking).await
    }

    async fn study_bookings_for(&self, student: StudentId) -> Result<Vec<StudyRoomBookingListing>> {
        self.inner.study_bookings_for(student).await
    }
}
