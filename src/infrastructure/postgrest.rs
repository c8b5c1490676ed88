use crate::domain::booking::{
    AllocatedRoom, BookingListing, BookingQuery, BookingRequest, BookingSort, BookingStatus,
    NewAllocation, Room, RoomAllocation, SortOrder,
};
use crate::domain::laundry::{LaundryRequest, LaundryStatus, NewLaundryRequest};
use crate::domain::notification::{NewNotification, Notification, Table};
use crate::domain::payment::{BillingMonth, NewPayment, Payment, PaymentSettlement, PaymentStatus};
use crate::domain::ports::{
    AllocationStore, BookingStore, LaundryStore, NotificationStore, PaymentStore, RoomStore,
    StudyRoomStore,
};
use crate::domain::study_room::{
    NewStudyRoomBooking, StudyRoom, StudyRoomBooking, StudyRoomBookingListing,
    StudyRoomBookingStatus,
};
use crate::domain::{
    AllocationId, BookingId, LaundryRequestId, NotificationId, PaymentId, RoomId, StudentId,
    StudyRoomId,
};
use crate::error::{HostelError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

type Filters = Vec<(&'static str, String)>;

const WITH_ROOM: &str = "*,room:rooms!inner(*)";
const WITH_STUDY_ROOM: &str = "*,study_room:study_rooms!inner(*)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Store adapter for a hosted PostgREST endpoint (`<url>/rest/v1`).
///
/// Guarded writes are `PATCH` requests whose filters include the expected
/// prior value; with `Prefer: return=representation` the number of returned
/// rows is the number of rows affected. The one-active-allocation-per-room
/// rule relies on the partial unique index in `sql/`.
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    rest_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    /// Acts on behalf of a signed-in user instead of the anonymous key.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, format!("{}/{}", self.rest_url, table.as_str()))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .header("Prefer", "return=representation")
    }

    async fn read_rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostelError::StoreError(format!("{status}: {body}")));
        }
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn written_rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostelError::WriteError(format!("{status}: {body}")));
        }
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        select: &str,
        mut filters: Filters,
    ) -> Result<Vec<T>> {
        filters.push(("select", select.to_string()));
        debug!(table = table.as_str(), ?filters, "select");
        let response = self
            .request(Method::GET, table)
            .query(&filters)
            .send()
            .await?;
        Self::read_rows(response).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: Table,
        select: &str,
        mut filters: Filters,
    ) -> Result<Option<T>> {
        filters.push(("limit", "1".to_string()));
        Ok(self.select(table, select, filters).await?.into_iter().next())
    }

    async fn insert<N: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: Table,
        row: &N,
    ) -> Result<T> {
        let response = self.request(Method::POST, table).json(row).send().await?;
        Self::written_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HostelError::WriteError(format!("no {} row returned", table.as_str())))
    }

    async fn update<P: Serialize + Sync>(&self, table: Table, filters: Filters, patch: &P) -> Result<u64> {
        debug!(table = table.as_str(), ?filters, "guarded update");
        let response = self
            .request(Method::PATCH, table)
            .query(&filters)
            .json(patch)
            .send()
            .await?;
        Ok(Self::written_rows::<Value>(response).await?.len() as u64)
    }

    async fn delete(&self, table: Table, filters: Filters) -> Result<u64> {
        let response = self
            .request(Method::DELETE, table)
            .query(&filters)
            .send()
            .await?;
        Ok(Self::written_rows::<Value>(response).await?.len() as u64)
    }
}

fn booking_order(query: &BookingQuery) -> String {
    let column = match query.sort {
        BookingSort::RequestDate => "request_date",
        BookingSort::RoomNumber => "room(room_number)",
        BookingSort::Status => "status",
    };
    let direction = match query.order {
        SortOrder::Ascending => "asc",
        SortOrder::Descending => "desc",
    };
    format!("{column}.{direction}")
}

#[async_trait]
impl BookingStore for PostgrestStore {
    async fn booking(&self, id: BookingId) -> Result<Option<BookingRequest>> {
        self.select_one(Table::BookingRequests, "*", vec![("id", eq(id))])
            .await
    }

    async fn booking_with_room(&self, id: BookingId) -> Result<Option<BookingListing>> {
        self.select_one(Table::BookingRequests, WITH_ROOM, vec![("id", eq(id))])
            .await
    }

    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<BookingListing>> {
        let mut filters = vec![("order", booking_order(query))];
        if let Some(status) = query.status {
            filters.push(("status", eq(status)));
        }
        self.select(Table::BookingRequests, WITH_ROOM, filters).await
    }

    async fn pending_booking_for(&self, student: StudentId) -> Result<Option<BookingRequest>> {
        self.select_one(
            Table::BookingRequests,
            "*",
            vec![
                ("student_id", eq(student)),
                ("status", eq(BookingStatus::Pending)),
                ("order", "request_date.desc".to_string()),
            ],
        )
        .await
    }

    async fn set_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        expected: BookingStatus,
    ) -> Result<u64> {
        self.update(
            Table::BookingRequests,
            vec![("id", eq(id)), ("status", eq(expected))],
            &json!({ "status": status, "updated_at": Utc::now() }),
        )
        .await
    }
}

#[async_trait]
impl RoomStore for PostgrestStore {
    async fn room(&self, id: RoomId) -> Result<Option<Room>> {
        self.select_one(Table::Rooms, "*", vec![("id", eq(id))]).await
    }

    async fn set_room_occupied(&self, id: RoomId, occupied: bool, expected: bool) -> Result<u64> {
        self.update(
            Table::Rooms,
            vec![("id", eq(id)), ("is_occupied", eq(expected))],
            &json!({ "is_occupied": occupied }),
        )
        .await
    }
}

#[async_trait]
impl AllocationStore for PostgrestStore {
    async fn insert_allocation(&self, allocation: NewAllocation) -> Result<RoomAllocation> {
        self.insert(Table::RoomAllocations, &allocation).await
    }

    async fn delete_allocation(&self, id: AllocationId) -> Result<u64> {
        self.delete(Table::RoomAllocations, vec![("id", eq(id))]).await
    }

    async fn active_allocation_for(&self, student: StudentId) -> Result<Option<AllocatedRoom>> {
        self.select_one(
            Table::RoomAllocations,
            WITH_ROOM,
            vec![
                ("student_id", eq(student)),
                ("status", eq("active")),
                ("order", "start_date.desc".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl PaymentStore for PostgrestStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        self.insert(Table::Payments, &payment).await
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.select_one(Table::Payments, "*", vec![("id", eq(id))]).await
    }

    async fn completed_payment_for(
        &self,
        student: StudentId,
        month: BillingMonth,
    ) -> Result<Option<Payment>> {
        self.select_one(
            Table::Payments,
            "*",
            vec![
                ("student_id", eq(student)),
                ("month", eq(month)),
                ("status", eq(PaymentStatus::Completed)),
            ],
        )
        .await
    }

    async fn payments_for(&self, student: StudentId) -> Result<Vec<Payment>> {
        self.select(
            Table::Payments,
            "*",
            vec![
                ("student_id", eq(student)),
                ("order", "payment_date.desc".to_string()),
            ],
        )
        .await
    }

    async fn settle_payment(
        &self,
        id: PaymentId,
        settlement: &PaymentSettlement,
        expected: PaymentStatus,
    ) -> Result<u64> {
        let patch = match settlement {
            PaymentSettlement::Completed {
                receipt,
                settled_at,
            } => json!({
                "status": PaymentStatus::Completed,
                "payment_date": settled_at,
                "transaction_code": receipt,
            }),
            PaymentSettlement::Failed => json!({
                "status": PaymentStatus::Failed,
                "transaction_code": null,
            }),
        };
        self.update(
            Table::Payments,
            vec![("id", eq(id)), ("status", eq(expected))],
            &patch,
        )
        .await
    }
}

#[async_trait]
impl LaundryStore for PostgrestStore {
    async fn insert_laundry_request(&self, request: NewLaundryRequest) -> Result<LaundryRequest> {
        self.insert(Table::LaundryRequests, &request).await
    }

    async fn laundry_request(&self, id: LaundryRequestId) -> Result<Option<LaundryRequest>> {
        self.select_one(Table::LaundryRequests, "*", vec![("id", eq(id))])
            .await
    }

    async fn laundry_requests(&self, student: Option<StudentId>) -> Result<Vec<LaundryRequest>> {
        let mut filters = vec![("order", "created_at.desc".to_string())];
        if let Some(student) = student {
            filters.push(("student_id", eq(student)));
        }
        self.select(Table::LaundryRequests, "*", filters).await
    }

    async fn set_laundry_status(
        &self,
        id: LaundryRequestId,
        status: LaundryStatus,
        expected: LaundryStatus,
    ) -> Result<u64> {
        self.update(
            Table::LaundryRequests,
            vec![("id", eq(id)), ("status", eq(expected))],
            &json!({ "status": status }),
        )
        .await
    }
}

#[async_trait]
impl NotificationStore for PostgrestStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        self.insert(Table::Notifications, &notification).await
    }

    async fn notifications_for(&self, student: StudentId) -> Result<Vec<Notification>> {
        self.select(
            Table::Notifications,
            "*",
            vec![
                ("student_id", eq(student)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn mark_notification_read(&self, id: NotificationId, owner: StudentId) -> Result<u64> {
        self.update(
            Table::Notifications,
            vec![("id", eq(id)), ("student_id", eq(owner))],
            &json!({ "read": true }),
        )
        .await
    }

    async fn mark_all_notifications_read(&self, owner: StudentId) -> Result<u64> {
        self.update(
            Table::Notifications,
            vec![("student_id", eq(owner)), ("read", eq(false))],
            &json!({ "read": true }),
        )
        .await
    }
}

#[async_trait]
impl StudyRoomStore for PostgrestStore {
    async fn available_study_rooms(&self) -> Result<Vec<StudyRoom>> {
        self.select(
            Table::StudyRooms,
            "*",
            vec![
                ("is_available", eq(true)),
                ("order", "room_number.asc".to_string()),
            ],
        )
        .await
    }

    async fn study_room(&self, id: StudyRoomId) -> Result<Option<StudyRoom>> {
        self.select_one(Table::StudyRooms, "*", vec![("id", eq(id))])
            .await
    }

    async fn approved_study_bookings(
        &self,
        room: StudyRoomId,
        date: NaiveDate,
    ) -> Result<Vec<StudyRoomBooking>> {
        self.select(
            Table::StudyRoomBookings,
            "*",
            vec![
                ("room_id", eq(room)),
                ("date", eq(date)),
                ("status", eq(StudyRoomBookingStatus::Approved)),
            ],
        )
        .await
    }

    async fn insert_study_booking(&self, booking: NewStudyRoomBooking) -> Result<StudyRoomBooking> {
        self.insert(Table::StudyRoomBookings, &booking).await
    }

    async fn study_bookings_for(&self, student: StudentId) -> Result<Vec<StudyRoomBookingListing>> {
        self.select(
            Table::StudyRoomBookings,
            WITH_STUDY_ROOM,
            vec![
                ("student_id", eq(student)),
                ("order", "date.asc,start_time.asc".to_string()),
            ],
        )
        .await
    }
}
