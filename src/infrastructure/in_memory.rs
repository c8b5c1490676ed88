use crate::domain::booking::{
    AllocatedRoom, AllocationStatus, BookingListing, BookingQuery, BookingRequest, BookingStatus,
    NewAllocation, Room, RoomAllocation,
};
use crate::domain::laundry::{LaundryRequest, LaundryStatus, NewLaundryRequest};
use crate::domain::notification::{ChangeEvent, ChangeKind, NewNotification, Notification, Table};
use crate::domain::payment::{BillingMonth, NewPayment, Payment, PaymentSettlement, PaymentStatus};
use crate::domain::ports::{
    AllocationStore, BookingStore, ChangeFeed, ChangeSubscription, LaundryStore,
    NotificationStore, PaymentStore, RoomStore, StudyRoomStore,
};
use crate::domain::study_room::{
    NewStudyRoomBooking, StudyRoom, StudyRoomBooking, StudyRoomBookingListing,
    StudyRoomBookingStatus,
};
use crate::domain::{
    AllocationId, BookingId, LaundryRequestId, NotificationId, PaymentId, RoomId, StudentId,
    StudyRoomBookingId, StudyRoomId,
};
use crate::error::{HostelError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

const CHANGE_BUFFER: usize = 256;

#[derive(Default)]
struct Tables {
    bookings: HashMap<BookingId, BookingRequest>,
    rooms: HashMap<RoomId, Room>,
    allocations: HashMap<AllocationId, RoomAllocation>,
    payments: HashMap<PaymentId, Payment>,
    laundry: HashMap<LaundryRequestId, LaundryRequest>,
    notifications: HashMap<NotificationId, Notification>,
    study_rooms: HashMap<StudyRoomId, StudyRoom>,
    study_bookings: HashMap<StudyRoomBookingId, StudyRoomBooking>,
}

/// A thread-safe in-memory store holding every hostel table.
///
/// Uses `Arc<RwLock<..>>` so clones share state, and publishes a
/// [`ChangeEvent`] for every committed write. Enforces at most one active
/// allocation per room, the way a partial unique index would.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            changes,
        }
    }

    fn publish<T: Serialize>(&self, table: Table, kind: ChangeKind, row: &T) -> Result<()> {
        let record = serde_json::to_value(row)?;
        // No subscribers is not an error.
        let _ = self.changes.send(ChangeEvent {
            table,
            kind,
            record,
        });
        Ok(())
    }

    /// Seeds a room.
    pub async fn put_room(&self, room: Room) -> Result<()> {
        self.tables.write().await.rooms.insert(room.id, room.clone());
        self.publish(Table::Rooms, ChangeKind::Insert, &room)
    }

    /// Seeds a booking request, as the student booking page would.
    pub async fn put_booking(&self, booking: BookingRequest) -> Result<()> {
        self.tables
            .write()
            .await
            .bookings
            .insert(booking.id, booking.clone());
        self.publish(Table::BookingRequests, ChangeKind::Insert, &booking)
    }

    pub async fn put_study_room(&self, room: StudyRoom) -> Result<()> {
        self.tables
            .write()
            .await
            .study_rooms
            .insert(room.id, room.clone());
        self.publish(Table::StudyRooms, ChangeKind::Insert, &room)
    }

    /// Seeds a study room booking in any status, as an administrator would leave it.
    pub async fn put_study_booking(&self, booking: StudyRoomBooking) -> Result<()> {
        self.tables
            .write()
            .await
            .study_bookings
            .insert(booking.id, booking.clone());
        self.publish(Table::StudyRoomBookings, ChangeKind::Insert, &booking)
    }

    pub async fn rooms(&self) -> Vec<Room> {
        self.tables.read().await.rooms.values().cloned().collect()
    }

    pub async fn allocations(&self) -> Vec<RoomAllocation> {
        self.tables.read().await.allocations.values().cloned().collect()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.read().await.payments.values().cloned().collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn booking(&self, id: BookingId) -> Result<Option<BookingRequest>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn booking_with_room(&self, id: BookingId) -> Result<Option<BookingListing>> {
        let tables = self.tables.read().await;
        Ok(tables.bookings.get(&id).and_then(|booking| {
            tables.rooms.get(&booking.room_id).map(|room| BookingListing {
                booking: booking.clone(),
                room: room.clone(),
            })
        }))
    }

    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<BookingListing>> {
        let tables = self.tables.read().await;
        let mut listings: Vec<BookingListing> = tables
            .bookings
            .values()
            .filter_map(|booking| {
                tables.rooms.get(&booking.room_id).map(|room| BookingListing {
                    booking: booking.clone(),
                    room: room.clone(),
                })
            })
            .collect();
        query.apply(&mut listings);
        Ok(listings)
    }

    async fn pending_booking_for(&self, student: StudentId) -> Result<Option<BookingRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.student_id == student && b.status == BookingStatus::Pending)
            .max_by_key(|b| b.request_date)
            .cloned())
    }

    async fn set_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        expected: BookingStatus,
    ) -> Result<u64> {
        let updated = {
            let mut tables = self.tables.write().await;
            match tables.bookings.get_mut(&id) {
                Some(booking) if booking.status == expected => {
                    booking.status = status;
                    Some(booking.clone())
                }
                _ => None,
            }
        };
        match updated {
            Some(booking) => {
                self.publish(Table::BookingRequests, ChangeKind::Update, &booking)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn room(&self, id: RoomId) -> Result<Option<Room>> {
        Ok(self.tables.read().await.rooms.get(&id).cloned())
    }

    async fn set_room_occupied(&self, id: RoomId, occupied: bool, expected: bool) -> Result<u64> {
        let updated = {
            let mut tables = self.tables.write().await;
            match tables.rooms.get_mut(&id) {
                Some(room) if room.is_occupied == expected => {
                    room.is_occupied = occupied;
                    Some(room.clone())
                }
                _ => None,
            }
        };
        match updated {
            Some(room) => {
                self.publish(Table::Rooms, ChangeKind::Update, &room)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl AllocationStore for InMemoryStore {
    async fn insert_allocation(&self, allocation: NewAllocation) -> Result<RoomAllocation> {
        let row = {
            let mut tables = self.tables.write().await;
            if !tables.rooms.contains_key(&allocation.room_id) {
                return Err(HostelError::WriteError(format!(
                    "room {} does not exist",
                    allocation.room_id
                )));
            }
            let room_taken = allocation.status == AllocationStatus::Active
                && tables.allocations.values().any(|a| {
                    a.room_id == allocation.room_id && a.status == AllocationStatus::Active
                });
            if room_taken {
                return Err(HostelError::WriteError(format!(
                    "room {} already has an active allocation",
                    allocation.room_id
                )));
            }
            let row = RoomAllocation {
                id: AllocationId::new(),
                student_id: allocation.student_id,
                room_id: allocation.room_id,
                start_date: allocation.start_date,
                end_date: allocation.end_date,
                status: allocation.status,
            };
            tables.allocations.insert(row.id, row.clone());
            row
        };
        self.publish(Table::RoomAllocations, ChangeKind::Insert, &row)?;
        Ok(row)
    }

    async fn delete_allocation(&self, id: AllocationId) -> Result<u64> {
        let removed = self.tables.write().await.allocations.remove(&id);
        match removed {
            Some(row) => {
                self.publish(Table::RoomAllocations, ChangeKind::Delete, &row)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn active_allocation_for(&self, student: StudentId) -> Result<Option<AllocatedRoom>> {
        let tables = self.tables.read().await;
        Ok(tables
            .allocations
            .values()
            .filter(|a| a.student_id == student && a.status == AllocationStatus::Active)
            .max_by_key(|a| a.start_date)
            .and_then(|allocation| {
                tables.rooms.get(&allocation.room_id).map(|room| AllocatedRoom {
                    allocation: allocation.clone(),
                    room: room.clone(),
                })
            }))
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let row = Payment {
            id: PaymentId::new(),
            student_id: payment.student_id,
            amount: payment.amount,
            status: payment.status,
            payment_date: payment.payment_date,
            payment_method: payment.payment_method,
            reference_number: payment.reference_number,
            month: payment.month,
            checkout_request_id: payment.checkout_request_id,
            transaction_code: None,
        };
        self.tables.write().await.payments.insert(row.id, row.clone());
        self.publish(Table::Payments, ChangeKind::Insert, &row)?;
        Ok(row)
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn completed_payment_for(
        &self,
        student: StudentId,
        month: BillingMonth,
    ) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| {
                p.student_id == student && p.month == month && p.status == PaymentStatus::Completed
            })
            .cloned())
    }

    async fn payments_for(&self, student: StudentId) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.student_id == student)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(payments)
    }

    async fn settle_payment(
        &self,
        id: PaymentId,
        settlement: &PaymentSettlement,
        expected: PaymentStatus,
    ) -> Result<u64> {
        let updated = {
            let mut tables = self.tables.write().await;
            match tables.payments.get_mut(&id) {
                Some(payment) if payment.status == expected => {
                    payment.settle(settlement)?;
                    Some(payment.clone())
                }
                _ => None,
            }
        };
        match updated {
            Some(payment) => {
                self.publish(Table::Payments, ChangeKind::Update, &payment)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl LaundryStore for InMemoryStore {
    async fn insert_laundry_request(&self, request: NewLaundryRequest) -> Result<LaundryRequest> {
        let row = LaundryRequest {
            id: LaundryRequestId::new(),
            student_id: request.student_id,
            room_number: request.room_number,
            number_of_clothes: request.number_of_clothes,
            special_instructions: request.special_instructions,
            pickup_time: request.pickup_time,
            status: request.status,
            created_at: Utc::now(),
        };
        self.tables.write().await.laundry.insert(row.id, row.clone());
        self.publish(Table::LaundryRequests, ChangeKind::Insert, &row)?;
        Ok(row)
    }

    async fn laundry_request(&self, id: LaundryRequestId) -> Result<Option<LaundryRequest>> {
        Ok(self.tables.read().await.laundry.get(&id).cloned())
    }

    async fn laundry_requests(&self, student: Option<StudentId>) -> Result<Vec<LaundryRequest>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<LaundryRequest> = tables
            .laundry
            .values()
            .filter(|r| student.is_none_or(|s| r.student_id == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn set_laundry_status(
        &self,
        id: LaundryRequestId,
        status: LaundryStatus,
        expected: LaundryStatus,
    ) -> Result<u64> {
        let updated = {
            let mut tables = self.tables.write().await;
            match tables.laundry.get_mut(&id) {
                Some(request) if request.status == expected => {
                    request.status = status;
                    Some(request.clone())
                }
                _ => None,
            }
        };
        match updated {
            Some(request) => {
                self.publish(Table::LaundryRequests, ChangeKind::Update, &request)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let row = Notification {
            id: NotificationId::new(),
            student_id: notification.student_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            read: false,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .notifications
            .insert(row.id, row.clone());
        self.publish(Table::Notifications, ChangeKind::Insert, &row)?;
        Ok(row)
    }

    async fn notifications_for(&self, student: StudentId) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut notifications: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.student_id == student)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: NotificationId, owner: StudentId) -> Result<u64> {
        let updated = {
            let mut tables = self.tables.write().await;
            match tables.notifications.get_mut(&id) {
                Some(n) if n.student_id == owner => {
                    n.read = true;
                    Some(n.clone())
                }
                _ => None,
            }
        };
        match updated {
            Some(n) => {
                self.publish(Table::Notifications, ChangeKind::Update, &n)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_all_notifications_read(&self, owner: StudentId) -> Result<u64> {
        let updated: Vec<Notification> = {
            let mut tables = self.tables.write().await;
            tables
                .notifications
                .values_mut()
                .filter(|n| n.student_id == owner && !n.read)
                .map(|n| {
                    n.read = true;
                    n.clone()
                })
                .collect()
        };
        for n in &updated {
            self.publish(Table::Notifications, ChangeKind::Update, n)?;
        }
        Ok(updated.len() as u64)
    }
}

#[async_trait]
impl StudyRoomStore for InMemoryStore {
    async fn available_study_rooms(&self) -> Result<Vec<StudyRoom>> {
        let tables = self.tables.read().await;
        let mut rooms: Vec<StudyRoom> = tables
            .study_rooms
            .values()
            .filter(|room| room.is_available)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));
        Ok(rooms)
    }

    async fn study_room(&self, id: StudyRoomId) -> Result<Option<StudyRoom>> {
        Ok(self.tables.read().await.study_rooms.get(&id).cloned())
    }

    async fn approved_study_bookings(
        &self,
        room: StudyRoomId,
        date: NaiveDate,
    ) -> Result<Vec<StudyRoomBooking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .study_bookings
            .values()
            .filter(|b| {
                b.room_id == room
                    && b.date == date
                    && b.status == StudyRoomBookingStatus::Approved
            })
            .cloned()
            .collect())
    }

    async fn insert_study_booking(&self, booking: NewStudyRoomBooking) -> Result<StudyRoomBooking> {
        let row = {
            let mut tables = self.tables.write().await;
            if !tables.study_rooms.contains_key(&booking.room_id) {
                return Err(HostelError::WriteError(format!(
                    "study room {} does not exist",
                    booking.room_id
                )));
            }
            let row = StudyRoomBooking {
                id: StudyRoomBookingId::new(),
                student_id: booking.student_id,
                room_id: booking.room_id,
                date: booking.date,
                start_time: booking.start_time,
                end_time: booking.end_time,
                status: booking.status,
                created_at: Utc::now(),
            };
            tables.study_bookings.insert(row.id, row.clone());
            row
        };
        self.publish(Table::StudyRoomBookings, ChangeKind::Insert, &row)?;
        Ok(row)
    }

    async fn study_bookings_for(&self, student: StudentId) -> Result<Vec<StudyRoomBookingListing>> {
        let tables = self.tables.read().await;
        let mut listings: Vec<StudyRoomBookingListing> = tables
            .study_bookings
            .values()
            .filter(|b| b.student_id == student)
            .filter_map(|booking| {
                tables
                    .study_rooms
                    .get(&booking.room_id)
                    .map(|room| StudyRoomBookingListing {
                        booking: booking.clone(),
                        study_room: room.clone(),
                    })
            })
            .collect();
        listings.sort_by_key(|l| (l.booking.date, l.booking.start_time));
        Ok(listings)
    }
}

impl ChangeFeed for InMemoryStore {
    fn subscribe(&self, table: Table, kinds: &[ChangeKind]) -> ChangeSubscription {
        ChangeSubscription::new(self.changes.subscribe(), table, kinds)
    }
}
