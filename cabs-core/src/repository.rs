use async_trait::async_trait;
use cabs_shared::{Cab, CabId, CabStatus, NewCab};

use crate::subscription::Subscription;
use crate::StoreResult;

/// Result of a conditional booking write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookOutcome {
    /// The cab flipped from available to booked
    Booked,
    /// The cab was already booked; nothing was written
    AlreadyBooked,
    /// The booking cap was reached; nothing was written
    LimitReached { limit: usize },
}

/// Access to the `cabs` collection of the remote document store
#[async_trait]
pub trait CabRepository: Send + Sync {
    /// One-shot read of every document in the collection
    async fn list_cabs(&self) -> StoreResult<Vec<Cab>>;

    async fn get_cab(&self, id: &CabId) -> StoreResult<Option<Cab>>;

    /// Equality query on the `status` field
    async fn list_by_status(&self, status: CabStatus) -> StoreResult<Vec<Cab>>;

    /// Write `status` (and the owner field) on an existing document, returning
    /// whether anything changed. Fails with `StoreError::NotFound` if the
    /// document does not exist.
    async fn set_status(
        &self,
        id: &CabId,
        status: CabStatus,
        booked_by: Option<&str>,
    ) -> StoreResult<bool>;

    /// Atomically book `id` only while fewer than `limit` documents are booked.
    async fn book_within_limit(
        &self,
        id: &CabId,
        limit: usize,
        requester: Option<&str>,
    ) -> StoreResult<BookOutcome>;

    /// Live view of a single document. The first item is the current state,
    /// `None` meaning the document is absent.
    async fn watch_cab(&self, id: &CabId) -> StoreResult<Subscription<Option<Cab>>>;

    /// Live view of the whole collection, starting with the current state
    async fn watch_cabs(&self) -> StoreResult<Subscription<Vec<Cab>>>;

    /// Out-of-band seeding; the store assigns the identifier
    async fn insert_cab(&self, cab: NewCab) -> StoreResult<CabId>;
}
