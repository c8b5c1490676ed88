//! Domain layer: entities, value objects, state machines and the ports the
//! workflows are written against.

pub mod booking;
pub mod laundry;
pub mod notification;
pub mod payment;
pub mod phone;
pub mod ports;
pub mod session;
pub mod study_room;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Identity of a student, as issued by the authentication backend.
    StudentId
);
id_type!(BookingId);
id_type!(RoomId);
id_type!(AllocationId);
id_type!(PaymentId);
id_type!(NotificationId);
id_type!(LaundryRequestId);
id_type!(StudyRoomId);
id_type!(StudyRoomBookingId);
