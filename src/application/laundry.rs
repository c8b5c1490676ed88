use crate::domain::LaundryRequestId;
use crate::domain::laundry::{LaundryOrder, LaundryRequest, LaundryStatus, NewLaundryRequest};
use crate::domain::ports::{ClockRef, HostelStoreRef};
use crate::domain::session::Session;
use crate::error::{HostelError, Result};
use tracing::{info, instrument};

/// Laundry pickup requests and their admin-driven status flow.
pub struct LaundryService {
    store: HostelStoreRef,
    clock: ClockRef,
}

impl LaundryService {
    pub fn new(store: HostelStoreRef, clock: ClockRef) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, session, order), fields(student = %session.user_id))]
    pub async fn submit(&self, session: &Session, order: LaundryOrder) -> Result<LaundryRequest> {
        if order.number_of_clothes == 0 {
            return Err(HostelError::ValidationError(
                "number of clothes must be greater than 0".to_string(),
            ));
        }
        if order.pickup_time < self.clock.now() {
            return Err(HostelError::ValidationError(
                "pickup time cannot be in the past".to_string(),
            ));
        }
        let allocated = self
            .store
            .active_allocation_for(session.user_id)
            .await?
            .ok_or_else(|| {
                HostelError::ValidationError(
                    "you must have an allocated room to submit laundry requests".to_string(),
                )
            })?;

        let request = self
            .store
            .insert_laundry_request(NewLaundryRequest {
                student_id: session.user_id,
                room_number: allocated.room.room_number,
                number_of_clothes: order.number_of_clothes,
                special_instructions: order.special_instructions,
                pickup_time: order.pickup_time,
                status: LaundryStatus::Pending,
            })
            .await?;
        info!(request_id = %request.id, "laundry request submitted");
        Ok(request)
    }

    pub async fn mine(&self, session: &Session) -> Result<Vec<LaundryRequest>> {
        self.store.laundry_requests(Some(session.user_id)).await
    }

    pub async fn all(&self, session: &Session) -> Result<Vec<LaundryRequest>> {
        session.require_admin("view all laundry requests")?;
        self.store.laundry_requests(None).await
    }

    /// Moves a request one step along `pending -> processing -> ready -> collected`.
    #[instrument(skip(self, session), fields(admin = %session.user_id))]
    pub async fn advance(&self, session: &Session, id: LaundryRequestId) -> Result<LaundryRequest> {
        session.require_admin("update laundry requests")?;
        let current = self
            .store
            .laundry_request(id)
            .await?
            .ok_or_else(|| HostelError::NotFound(format!("laundry request {id}")))?;
        let next = current.status.next().ok_or_else(|| {
            HostelError::Conflict(format!("laundry request {id} was already collected"))
        })?;

        let rows = self.store.set_laundry_status(id, next, current.status).await?;
        if rows == 0 {
            return Err(HostelError::Conflict(format!(
                "laundry request {id} changed while updating"
            )));
        }
        info!(request_id = %id, from = %current.status, to = %next, "laundry status advanced");
        Ok(LaundryRequest {
            status: next,
            ..current
        })
    }
}
