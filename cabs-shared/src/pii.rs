use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a requester identifier so it never shows up in `Debug`/`Display`
/// output, while still serializing the real value onto the event bus.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::models::events::BookingEvent;
    use crate::CabId;

    #[test]
    fn test_requester_hidden_in_logs() {
        let event = BookingEvent::booked(CabId::new("cab-9"), Some("guest-42"));
        let debug = format!("{:?}", event);
        assert!(!debug.contains("guest-42"));
        assert!(debug.contains("cab-9"));
    }

    #[test]
    fn test_requester_serialized_for_consumers() {
        let event = BookingEvent::cancelled(CabId::new("cab-9"), Some("guest-42"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["requester"], "guest-42");
        assert_eq!(json["kind"], "CANCELLED");
        assert_eq!(event.requester.unwrap().expose(), "guest-42");
    }
}
