use async_trait::async_trait;
use cabs_core::{BookOutcome, CabRepository, StoreError, StoreResult, Subscription};
use cabs_shared::{Cab, CabId, CabStatus, NewCab};
use futures_util::{future, stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

const CHANGE_BUFFER: usize = 64;

#[derive(Debug, Clone)]
enum Signal {
    /// A document changed; carries the whole collection after the write
    Changed { id: CabId, snapshot: Arc<Vec<Cab>> },
    /// The store went offline; listeners receive the error and keep waiting
    Fault(StoreError),
}

struct Inner {
    docs: Mutex<Vec<Cab>>,
    changes: broadcast::Sender<Signal>,
    offline: AtomicBool,
}

/// Process-local cab collection with live change feeds.
///
/// Documents keep insertion order. Writes and the booking-cap check share one
/// lock, so `book_within_limit` cannot overshoot under concurrent callers.
#[derive(Clone)]
pub struct MemoryCabStore {
    inner: Arc<Inner>,
}

impl MemoryCabStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                docs: Mutex::new(Vec::new()),
                changes,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Insert a document and return its assigned id
    pub fn insert(&self, cab: NewCab) -> StoreResult<CabId> {
        let id = CabId::generate();
        let mut docs = self.inner.docs()?;
        docs.push(Cab::from_new(id.clone(), cab));
        self.inner.publish(&docs, &id);
        Ok(id)
    }

    /// Number of live subscriptions currently registered
    pub fn listener_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }

    /// Simulate losing the backend: every call fails and live listeners are
    /// notified with an error until the store is brought back online.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
        if offline {
            warn!("Memory cab store set offline");
            let _ = self
                .inner
                .changes
                .send(Signal::Fault(StoreError::Backend("store unavailable".to_string())));
        }
    }
}

impl Default for MemoryCabStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn docs(&self) -> StoreResult<MutexGuard<'_, Vec<Cab>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        self.docs
            .lock()
            .map_err(|_| StoreError::Backend("cab store lock poisoned".to_string()))
    }

    fn snapshot(&self) -> StoreResult<Vec<Cab>> {
        Ok(self.docs()?.clone())
    }

    fn find(&self, id: &CabId) -> StoreResult<Option<Cab>> {
        Ok(self.docs()?.iter().find(|c| &c.id == id).cloned())
    }

    // Called with the lock held so listeners see writes in commit order.
    fn publish(&self, docs: &[Cab], id: &CabId) {
        // No receivers is not an error
        let _ = self.changes.send(Signal::Changed {
            id: id.clone(),
            snapshot: Arc::new(docs.to_vec()),
        });
    }
}

#[async_trait]
impl CabRepository for MemoryCabStore {
    async fn list_cabs(&self) -> StoreResult<Vec<Cab>> {
        self.inner.snapshot()
    }

    async fn get_cab(&self, id: &CabId) -> StoreResult<Option<Cab>> {
        self.inner.find(id)
    }

    async fn list_by_status(&self, status: CabStatus) -> StoreResult<Vec<Cab>> {
        Ok(self
            .inner
            .docs()?
            .iter()
            .filter(|c| c.status == status)
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        id: &CabId,
        status: CabStatus,
        booked_by: Option<&str>,
    ) -> StoreResult<bool> {
        let mut docs = self.inner.docs()?;
        let cab = docs
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let owner = match status {
            CabStatus::Booked => booked_by.map(str::to_string),
            CabStatus::Available => None,
        };
        if cab.status == status && cab.booked_by == owner {
            return Ok(false);
        }
        cab.status = status;
        cab.booked_by = owner;

        self.inner.publish(&docs, id);
        Ok(true)
    }

    async fn book_within_limit(
        &self,
        id: &CabId,
        limit: usize,
        requester: Option<&str>,
    ) -> StoreResult<BookOutcome> {
        let mut docs = self.inner.docs()?;
        let booked = docs.iter().filter(|c| c.is_booked()).count();
        let cab = docs
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if cab.is_booked() {
            return Ok(BookOutcome::AlreadyBooked);
        }
        if booked >= limit {
            return Ok(BookOutcome::LimitReached { limit });
        }

        cab.status = CabStatus::Booked;
        cab.booked_by = requester.map(str::to_string);
        info!("Cab {} booked ({} of {})", id, booked + 1, limit);

        self.inner.publish(&docs, id);
        Ok(BookOutcome::Booked)
    }

    async fn watch_cab(&self, id: &CabId) -> StoreResult<Subscription<Option<Cab>>> {
        // Register before reading so no write falls between the two
        let rx = self.inner.changes.subscribe();
        let current = self.inner.find(id)?;

        let inner = self.inner.clone();
        let id = id.clone();
        let updates = BroadcastStream::new(rx).filter_map(move |signal| {
            let item = match signal {
                Ok(Signal::Changed { id: changed, snapshot }) if changed == id => {
                    Some(Ok(snapshot.iter().find(|c| c.id == id).cloned()))
                }
                Ok(Signal::Changed { .. }) => None,
                Ok(Signal::Fault(e)) => Some(Err(e)),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Cab {} listener lagged by {} changes, re-reading", id, skipped);
                    Some(inner.find(&id))
                }
            };
            future::ready(item)
        });

        Ok(Subscription::new(stream::once(future::ready(Ok(current))).chain(updates)))
    }

    async fn watch_cabs(&self) -> StoreResult<Subscription<Vec<Cab>>> {
        let rx = self.inner.changes.subscribe();
        let current = self.inner.snapshot()?;

        let inner = self.inner.clone();
        let updates = BroadcastStream::new(rx).filter_map(move |signal| {
            let item = match signal {
                Ok(Signal::Changed { snapshot, .. }) => Some(Ok(snapshot.as_ref().clone())),
                Ok(Signal::Fault(e)) => Some(Err(e)),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Collection listener lagged by {} changes, re-reading", skipped);
                    Some(inner.snapshot())
                }
            };
            future::ready(item)
        });

        Ok(Subscription::new(stream::once(future::ready(Ok(current))).chain(updates)))
    }

    async fn insert_cab(&self, cab: NewCab) -> StoreResult<CabId> {
        self.insert(cab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize) -> (MemoryCabStore, Vec<CabId>) {
        let store = MemoryCabStore::new();
        let ids = (0..n)
            .map(|i| {
                store
                    .insert(NewCab::new(format!("Company {}", i), "Sedan").with_cost(40.0))
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[tokio::test]
    async fn test_list_returns_every_document_with_id() {
        let (store, ids) = seeded(5);
        let cabs = store.list_cabs().await.unwrap();
        assert_eq!(cabs.len(), 5);
        for (cab, id) in cabs.iter().zip(&ids) {
            assert_eq!(&cab.id, id);
        }
    }

    #[tokio::test]
    async fn test_set_status_on_missing_document() {
        let (store, _) = seeded(1);
        let missing = CabId::new("nope");
        let err = store.set_status(&missing, CabStatus::Booked, None).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(missing));
    }

    #[tokio::test]
    async fn test_cancel_clears_owner() {
        let (store, ids) = seeded(1);
        assert!(store.set_status(&ids[0], CabStatus::Booked, Some("guest-1")).await.unwrap());
        assert_eq!(store.get_cab(&ids[0]).await.unwrap().unwrap().booked_by.as_deref(), Some("guest-1"));

        assert!(store.set_status(&ids[0], CabStatus::Available, Some("guest-1")).await.unwrap());
        let cab = store.get_cab(&ids[0]).await.unwrap().unwrap();
        assert_eq!(cab.status, CabStatus::Available);
        assert!(cab.booked_by.is_none());

        // Already available: nothing to write
        assert!(!store.set_status(&ids[0], CabStatus::Available, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_book_within_limit_outcomes() {
        let (store, ids) = seeded(3);
        assert_eq!(store.book_within_limit(&ids[0], 2, None).await.unwrap(), BookOutcome::Booked);
        assert_eq!(store.book_within_limit(&ids[0], 2, None).await.unwrap(), BookOutcome::AlreadyBooked);
        assert_eq!(store.book_within_limit(&ids[1], 2, None).await.unwrap(), BookOutcome::Booked);
        assert_eq!(
            store.book_within_limit(&ids[2], 2, None).await.unwrap(),
            BookOutcome::LimitReached { limit: 2 }
        );
        assert_eq!(store.list_by_status(CabStatus::Booked).await.unwrap().len(), 2);
        assert!(!store.get_cab(&ids[2]).await.unwrap().unwrap().is_booked());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_respect_cap() {
        let (store, ids) = seeded(10);
        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move { store.book_within_limit(&id, 2, None).await })
            })
            .collect();

        let mut booked = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == BookOutcome::Booked {
                booked += 1;
            }
        }
        assert_eq!(booked, 2);
        assert_eq!(store.list_by_status(CabStatus::Booked).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_watch_cab_sees_only_its_document() {
        let (store, ids) = seeded(2);
        let mut sub = store.watch_cab(&ids[0]).await.unwrap();

        let first = sub.next().await.unwrap().unwrap().unwrap();
        assert_eq!(first.status, CabStatus::Available);

        store.set_status(&ids[1], CabStatus::Booked, None).await.unwrap();
        store.set_status(&ids[0], CabStatus::Booked, None).await.unwrap();

        let next = sub.next().await.unwrap().unwrap().unwrap();
        assert_eq!(next.id, ids[0]);
        assert_eq!(next.status, CabStatus::Booked);
    }

    #[tokio::test]
    async fn test_watch_missing_document_yields_none() {
        let (store, _) = seeded(1);
        let mut sub = store.watch_cab(&CabId::new("ghost")).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropping_subscription_deregisters() {
        let (store, ids) = seeded(1);
        assert_eq!(store.listener_count(), 0);

        let detail = store.watch_cab(&ids[0]).await.unwrap();
        let all = store.watch_cabs().await.unwrap();
        assert_eq!(store.listener_count(), 2);

        detail.unsubscribe();
        assert_eq!(store.listener_count(), 1);
        drop(all);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_store_fails_reads_and_notifies_listeners() {
        let (store, _) = seeded(1);
        let mut sub = store.watch_cabs().await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap().len(), 1);

        store.set_offline(true);
        assert!(store.list_cabs().await.is_err());
        assert!(matches!(sub.next().await, Some(Err(StoreError::Backend(_)))));

        store.set_offline(false);
        assert_eq!(store.list_cabs().await.unwrap().len(), 1);
    }
}
