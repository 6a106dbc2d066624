use crate::models::cab::CabId;
use crate::pii::Masked;
use chrono::Utc;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventKind {
    Booked,
    Cancelled,
}

/// Emitted after a booking transition has been written to the store
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingEvent {
    pub cab_id: CabId,
    pub kind: BookingEventKind,
    pub requester: Option<Masked<String>>,
    pub timestamp: i64,
}

impl BookingEvent {
    pub fn booked(cab_id: CabId, requester: Option<&str>) -> Self {
        Self::now(cab_id, BookingEventKind::Booked, requester)
    }

    pub fn cancelled(cab_id: CabId, requester: Option<&str>) -> Self {
        Self::now(cab_id, BookingEventKind::Cancelled, requester)
    }

    fn now(cab_id: CabId, kind: BookingEventKind, requester: Option<&str>) -> Self {
        Self {
            cab_id,
            kind,
            requester: requester.map(|r| Masked(r.to_string())),
            timestamp: Utc::now().timestamp(),
        }
    }
}
