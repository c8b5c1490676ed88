//! Application layer containing the workflow orchestration.
//!
//! The workflows hold no state of their own: every call re-derives what it
//! needs from the store, so a failed or interrupted call can be retried by
//! re-reading current state.

pub mod allocation;
pub mod laundry;
pub mod notifications;
pub mod payment;
pub mod residence;
pub mod saga;
pub mod study_rooms;
