pub mod events;
pub mod notice;
pub mod repository;
pub mod subscription;

pub use events::{BookingEventSink, EventError, TracingEventSink};
pub use notice::{Notice, NoticeLevel};
pub use repository::{BookOutcome, CabRepository};
pub use subscription::Subscription;

use cabs_shared::CabId;

/// Failures surfaced by a cab store backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Cab not found: {0}")]
    NotFound(CabId),
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Malformed cab document {id}: {reason}")]
    Malformed { id: String, reason: String },
    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
