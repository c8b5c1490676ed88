use super::saga::{Saga, SagaStep};
use crate::domain::BookingId;
use crate::domain::booking::{
    BookingListing, BookingQuery, BookingRequest, BookingStatus, NewAllocation, RoomAllocation,
};
use crate::domain::ports::{ClockRef, HostelStoreRef};
use crate::domain::session::Session;
use crate::error::{HostelError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

/// Result of an approve/reject call together with the booking list re-read
/// after the outcome, success or failure.
#[derive(Debug)]
pub struct Decision {
    pub outcome: Result<BookingStatus>,
    pub bookings: Vec<BookingListing>,
}

impl Decision {
    pub fn into_result(self) -> Result<Vec<BookingListing>> {
        self.outcome.map(|_| self.bookings)
    }
}

/// Turns booking requests into room allocations.
///
/// Approval runs as a saga of guarded writes: the booking's
/// `pending -> approved` transition and the room's `is_occupied` flag act as
/// compare-and-swap guards, so two approvals racing for one room cannot both
/// commit.
pub struct AllocationWorkflow {
    store: HostelStoreRef,
    clock: ClockRef,
    listing: BookingQuery,
}

impl AllocationWorkflow {
    pub fn new(store: HostelStoreRef, clock: ClockRef) -> Self {
        Self {
            store,
            clock,
            listing: BookingQuery::default(),
        }
    }

    /// The query used to refresh the booking list after a decision.
    pub fn with_listing(mut self, query: BookingQuery) -> Self {
        self.listing = query;
        self
    }

    #[instrument(skip(self, session), fields(admin = %session.user_id))]
    pub async fn approve(&self, session: &Session, booking_id: BookingId) -> Result<Decision> {
        session.require_admin("approve booking requests")?;
        let outcome = self.run_approval(booking_id).await;
        match &outcome {
            Ok(_) => info!(%booking_id, "booking approved and room allocated"),
            Err(err) => warn!(%booking_id, error = %err, "booking approval failed"),
        }
        self.decide(outcome).await
    }

    #[instrument(skip(self, session), fields(admin = %session.user_id))]
    pub async fn reject(&self, session: &Session, booking_id: BookingId) -> Result<Decision> {
        session.require_admin("reject booking requests")?;
        let outcome = self.run_rejection(booking_id).await;
        match &outcome {
            Ok(_) => info!(%booking_id, "booking rejected"),
            Err(err) => warn!(%booking_id, error = %err, "booking rejection failed"),
        }
        self.decide(outcome).await
    }

    pub async fn bookings(
        &self,
        session: &Session,
        query: &BookingQuery,
    ) -> Result<Vec<BookingListing>> {
        session.require_admin("list booking requests")?;
        self.store.list_bookings(query).await
    }

    async fn decide(&self, outcome: Result<BookingStatus>) -> Result<Decision> {
        match self.store.list_bookings(&self.listing).await {
            Ok(bookings) => Ok(Decision { outcome, bookings }),
            // A failed decision's error wins over a failed refresh.
            Err(refresh) => match outcome {
                Ok(_) => Err(refresh),
                Err(err) => {
                    warn!(error = %refresh, "could not refresh bookings after a failed decision");
                    Err(err)
                }
            },
        }
    }

    async fn run_approval(&self, booking_id: BookingId) -> Result<BookingStatus> {
        let listing = self
            .store
            .booking_with_room(booking_id)
            .await?
            .ok_or_else(|| HostelError::NotFound(format!("booking request {booking_id}")))?;

        if listing.room.is_occupied {
            return Err(HostelError::Conflict(format!(
                "room {} is already occupied",
                listing.room.room_number
            )));
        }

        let saga = Saga::new("approve-booking")
            .step(ApproveBooking {
                store: self.store.clone(),
            })
            .step(CreateAllocation {
                store: self.store.clone(),
            })
            .step(OccupyRoom {
                store: self.store.clone(),
            });

        let mut ctx = ApprovalContext {
            booking: listing.booking,
            room_number: listing.room.room_number,
            started_at: self.clock.now(),
            allocation: None,
        };
        saga.run(&mut ctx).await?;
        Ok(BookingStatus::Approved)
    }

    async fn run_rejection(&self, booking_id: BookingId) -> Result<BookingStatus> {
        let rows = self
            .store
            .set_booking_status(booking_id, BookingStatus::Rejected, BookingStatus::Pending)
            .await?;
        if rows == 0 {
            return Err(match self.store.booking(booking_id).await? {
                None => HostelError::NotFound(format!("booking request {booking_id}")),
                Some(booking) => HostelError::Conflict(format!(
                    "booking request {booking_id} is already {}",
                    booking.status
                )),
            });
        }
        Ok(BookingStatus::Rejected)
    }
}

fn write_failure(context: &str, err: HostelError) -> HostelError {
    let detail = match err {
        HostelError::WriteError(msg) => msg,
        other => other.to_string(),
    };
    HostelError::WriteError(format!("{context}: {detail}"))
}

struct ApprovalContext {
    booking: BookingRequest,
    room_number: String,
    started_at: DateTime<Utc>,
    allocation: Option<RoomAllocation>,
}

struct ApproveBooking {
    store: HostelStoreRef,
}

#[async_trait]
impl SagaStep<ApprovalContext> for ApproveBooking {
    fn name(&self) -> &'static str {
        "approve-booking"
    }

    async fn execute(&self, ctx: &mut ApprovalContext) -> Result<()> {
        let rows = self
            .store
            .set_booking_status(
                ctx.booking.id,
                BookingStatus::Approved,
                BookingStatus::Pending,
            )
            .await?;
        if rows == 0 {
            return Err(HostelError::Conflict(format!(
                "booking request {} is no longer pending",
                ctx.booking.id
            )));
        }
        Ok(())
    }

    async fn compensate(&self, ctx: &mut ApprovalContext) -> Result<()> {
        let rows = self
            .store
            .set_booking_status(
                ctx.booking.id,
                BookingStatus::Pending,
                BookingStatus::Approved,
            )
            .await?;
        if rows == 0 {
            warn!(booking_id = %ctx.booking.id, "booking was no longer approved when reverting");
        }
        Ok(())
    }
}

struct CreateAllocation {
    store: HostelStoreRef,
}

#[async_trait]
impl SagaStep<ApprovalContext> for CreateAllocation {
    fn name(&self) -> &'static str {
        "create-allocation"
    }

    async fn execute(&self, ctx: &mut ApprovalContext) -> Result<()> {
        let allocation =
            NewAllocation::active(ctx.booking.student_id, ctx.booking.room_id, ctx.started_at);
        let created = self
            .store
            .insert_allocation(allocation)
            .await
            .map_err(|err| write_failure("failed to create room allocation", err))?;
        ctx.allocation = Some(created);
        Ok(())
    }

    async fn compensate(&self, ctx: &mut ApprovalContext) -> Result<()> {
        if let Some(allocation) = ctx.allocation.take() {
            self.store.delete_allocation(allocation.id).await?;
        }
        Ok(())
    }
}

struct OccupyRoom {
    store: HostelStoreRef,
}

#[async_trait]
impl SagaStep<ApprovalContext> for OccupyRoom {
    fn name(&self) -> &'static str {
        "occupy-room"
    }

    async fn execute(&self, ctx: &mut ApprovalContext) -> Result<()> {
        let rows = self
            .store
            .set_room_occupied(ctx.booking.room_id, true, false)
            .await
            .map_err(|err| write_failure("failed to update room status", err))?;
        if rows == 0 {
            return Err(HostelError::Conflict(format!(
                "room {} was taken while approving",
                ctx.room_number
            )));
        }
        Ok(())
    }

    async fn compensate(&self, ctx: &mut ApprovalContext) -> Result<()> {
        self.store
            .set_room_occupied(ctx.booking.room_id, false, true)
            .await?;
        Ok(())
    }
}
