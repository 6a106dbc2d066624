pub mod cab;
pub mod events;
