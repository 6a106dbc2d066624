use async_trait::async_trait;
use cabs_shared::BookingEvent;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Event publish failed: {0}")]
    Publish(String),
    #[error("Event encoding failed: {0}")]
    Encode(String),
}

/// Outbound feed of booking transitions
#[async_trait]
pub trait BookingEventSink: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> Result<(), EventError>;
}

/// Sink used when no broker is configured: events only reach the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl BookingEventSink for TracingEventSink {
    async fn publish(&self, event: &BookingEvent) -> Result<(), EventError> {
        info!(cab_id = %event.cab_id, kind = ?event.kind, "Booking event");
        Ok(())
    }
}
