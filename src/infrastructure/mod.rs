pub mod clock;
pub mod in_memory;
pub mod mpesa;
pub mod postgrest;
pub mod scripted_gateway;
