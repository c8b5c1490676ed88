use crate::domain::ports::{ClockRef, HostelStoreRef};
use crate::domain::session::Session;
use crate::domain::study_room::{
    NewStudyRoomBooking, StudyRoom, StudyRoomBooking, StudyRoomBookingListing,
    StudyRoomBookingStatus, StudyRoomRequest,
};
use crate::error::{HostelError, Result};
use tracing::{info, instrument, warn};

/// Study room reservations.
///
/// A request is refused when its slot overlaps an approved booking of the
/// same room on the same date; otherwise it is stored as `pending` for an
/// administrator to decide.
pub struct StudyRooms {
    store: HostelStoreRef,
    clock: ClockRef,
}

impl StudyRooms {
    pub fn new(store: HostelStoreRef, clock: ClockRef) -> Self {
        Self { store, clock }
    }

    pub async fn available(&self) -> Result<Vec<StudyRoom>> {
        self.store.available_study_rooms().await
    }

    pub async fn mine(&self, session: &Session) -> Result<Vec<StudyRoomBookingListing>> {
        self.store.study_bookings_for(session.user_id).await
    }

    #[instrument(skip(self, session, request), fields(student = %session.user_id, room = %request.room_id, slot = %request.slot))]
    pub async fn request(
        &self,
        session: &Session,
        request: StudyRoomRequest,
    ) -> Result<StudyRoomBooking> {
        if request.date < self.clock.now().date_naive() {
            return Err(HostelError::ValidationError(format!(
                "cannot book a study room for a past date ({})",
                request.date
            )));
        }

        let room = self
            .store
            .study_room(request.room_id)
            .await?
            .ok_or_else(|| HostelError::NotFound(format!("study room {}", request.room_id)))?;
        if !room.is_available {
            return Err(HostelError::ValidationError(format!(
                "study room {} is not open for booking",
                room.room_number
            )));
        }

        let approved = self
            .store
            .approved_study_bookings(room.id, request.date)
            .await?;
        let clash = approved.iter().find(|booking| match booking.slot() {
            Some(slot) => slot.overlaps(&request.slot),
            None => {
                warn!(booking_id = %booking.id, "approved study booking has an invalid slot");
                false
            }
        });
        if let Some(clash) = clash {
            return Err(HostelError::Conflict(format!(
                "study room {} is already booked on {} from {} to {}",
                room.room_number,
                request.date,
                clash.start_time.format("%H:%M"),
                clash.end_time.format("%H:%M")
            )));
        }

        let booking = self
            .store
            .insert_study_booking(NewStudyRoomBooking {
                student_id: session.user_id,
                room_id: room.id,
                date: request.date,
                start_time: request.slot.start(),
                end_time: request.slot.end(),
                status: StudyRoomBookingStatus::Pending,
            })
            .await?;
        info!(booking_id = %booking.id, "study room booking requested");
        Ok(booking)
    }
}
