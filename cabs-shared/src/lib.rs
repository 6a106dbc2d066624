pub mod models;
pub mod pii;

pub use models::cab::{Cab, CabId, CabStatus, NewCab};
pub use models::events::{BookingEvent, BookingEventKind};
pub use pii::Masked;
