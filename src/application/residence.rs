use crate::domain::booking::{AllocatedRoom, BookingRequest};
use crate::domain::payment::{Amount, Charge, Payment, PaymentRequest};
use crate::domain::ports::HostelStoreRef;
use crate::domain::session::Session;
use crate::error::{HostelError, Result};
use rust_decimal::Decimal;

/// Where a student stands with respect to housing.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomStatus {
    Allocated(AllocatedRoom),
    PendingBooking(BookingRequest),
    Unassigned,
}

/// Student-facing reads over allocations and bookings.
pub struct Residence {
    store: HostelStoreRef,
}

impl Residence {
    pub fn new(store: HostelStoreRef) -> Self {
        Self { store }
    }

    pub async fn room_status(&self, session: &Session) -> Result<RoomStatus> {
        if let Some(allocated) = self.store.active_allocation_for(session.user_id).await? {
            return Ok(RoomStatus::Allocated(allocated));
        }
        Ok(match self.store.pending_booking_for(session.user_id).await? {
            Some(booking) => RoomStatus::PendingBooking(booking),
            None => RoomStatus::Unassigned,
        })
    }

    /// Payments made by the session's student, newest first.
    pub async fn payment_history(&self, session: &Session) -> Result<Vec<Payment>> {
        self.store.payments_for(session.user_id).await
    }

    /// Prices the selected charges into a payment request.
    ///
    /// Room rent is taken from the student's allocated room.
    pub async fn quote(
        &self,
        session: &Session,
        charges: &[Charge],
        phone: &str,
    ) -> Result<PaymentRequest> {
        if charges.is_empty() {
            return Err(HostelError::ValidationError(
                "select at least one charge to pay".to_string(),
            ));
        }

        let mut total = Decimal::ZERO;
        let mut names = Vec::with_capacity(charges.len());
        for charge in charges {
            let price = match charge.flat_price() {
                Some(price) => price,
                None => {
                    self.store
                        .active_allocation_for(session.user_id)
                        .await?
                        .ok_or_else(|| {
                            HostelError::NotFound("active room allocation".to_string())
                        })?
                        .room
                        .price_per_month
                }
            };
            total += price;
            names.push(charge.name());
        }

        Ok(PaymentRequest::new(Amount::new(total)?, phone, names.join(", ")))
    }
}
