use cabs_core::notice::messages;
use cabs_core::{BookOutcome, BookingEventSink, CabRepository, Notice, StoreError};
use cabs_shared::{BookingEvent, CabId, CabStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Cab not found: {0}")]
    NotFound(CabId),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => BookingError::NotFound(id),
            other => BookingError::Store(other),
        }
    }
}

/// Performs the book and cancel transitions on a cab's status.
///
/// State machine per cab: `Available --book--> Booked --cancel--> Available`.
/// Booking an already-booked cab and cancelling an available one write nothing.
pub struct BookingService {
    repo: Arc<dyn CabRepository>,
    events: Arc<dyn BookingEventSink>,
    limit: usize,
}

impl BookingService {
    pub fn new(repo: Arc<dyn CabRepository>, events: Arc<dyn BookingEventSink>, limit: usize) -> Self {
        Self { repo, events, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Book `cab_id` unless the global cap is already reached.
    ///
    /// The cap check and the write are a single conditional write in the
    /// store, so concurrent callers cannot push the count past the limit.
    pub async fn book(&self, cab_id: &CabId, requester: Option<&str>) -> Result<BookOutcome, BookingError> {
        let outcome = self.repo.book_within_limit(cab_id, self.limit, requester).await?;

        match outcome {
            BookOutcome::Booked => {
                info!("Cab {} booked", cab_id);
                self.emit(BookingEvent::booked(cab_id.clone(), requester)).await;
            }
            BookOutcome::AlreadyBooked => info!("Cab {} already booked", cab_id),
            BookOutcome::LimitReached { limit } => {
                warn!("Booking of cab {} rejected: limit of {} reached", cab_id, limit)
            }
        }
        Ok(outcome)
    }

    /// Unconditionally mark `cab_id` available. Ownership is not checked.
    pub async fn cancel(&self, cab_id: &CabId, requester: Option<&str>) -> Result<(), BookingError> {
        let changed = self.repo.set_status(cab_id, CabStatus::Available, None).await?;

        if changed {
            info!("Booking of cab {} cancelled", cab_id);
            self.emit(BookingEvent::cancelled(cab_id.clone(), requester)).await;
        }
        Ok(())
    }

    pub async fn book_with_notice(&self, cab_id: &CabId, requester: Option<&str>) -> Notice {
        book_notice(&self.book(cab_id, requester).await)
    }

    pub async fn cancel_with_notice(&self, cab_id: &CabId, requester: Option<&str>) -> Notice {
        cancel_notice(&self.cancel(cab_id, requester).await)
    }

    async fn emit(&self, event: BookingEvent) {
        // The write already happened; a lost event must not fail the booking
        if let Err(e) = self.events.publish(&event).await {
            error!("Failed to publish booking event for cab {}: {}", event.cab_id, e);
        }
    }
}

/// Transient message for a book attempt
pub fn book_notice(result: &Result<BookOutcome, BookingError>) -> Notice {
    match result {
        Ok(BookOutcome::Booked) => Notice::success(messages::BOOK_SUCCEEDED),
        Ok(BookOutcome::AlreadyBooked) => Notice::info("Already Booked", messages::ALREADY_BOOKED),
        Ok(BookOutcome::LimitReached { limit }) => Notice::limit_reached(*limit),
        Err(_) => Notice::error(messages::BOOK_FAILED),
    }
}

/// Transient message for a cancel attempt
pub fn cancel_notice(result: &Result<(), BookingError>) -> Notice {
    match result {
        Ok(()) => Notice::success(messages::CANCEL_SUCCEEDED),
        Err(_) => Notice::error(messages::CANCEL_FAILED),
    }
}
