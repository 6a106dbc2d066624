use cabs_core::notice::messages;
use cabs_core::{CabRepository, Notice, Subscription};
use cabs_shared::{Cab, CabId};
use tracing::{debug, error};

use crate::service::BookingService;

/// Whose bookings the list shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BookingScope {
    /// Every booked cab, regardless of who booked it
    #[default]
    All,
    Requester(String),
}

impl BookingScope {
    pub fn includes(&self, cab: &Cab) -> bool {
        match self {
            BookingScope::All => cab.is_booked(),
            BookingScope::Requester(requester) => cab.is_booked_by(requester),
        }
    }

    pub fn requester(&self) -> Option<&str> {
        match self {
            BookingScope::All => None,
            BookingScope::Requester(requester) => Some(requester),
        }
    }
}

/// The booked subset of a collection snapshot, in snapshot order
pub fn booked_subset(cabs: &[Cab], scope: &BookingScope) -> Vec<Cab> {
    cabs.iter().filter(|cab| scope.includes(cab)).cloned().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingListUpdate {
    Refreshed(Vec<Cab>),
    /// The listener failed and has been released
    Failed(String),
}

/// Live list of booked cabs.
///
/// Subscribes to the whole collection and re-filters on every snapshot.
/// A successful cancel removes the row locally right away; the next
/// snapshot from the store converges to the same list.
pub struct BookingListView {
    scope: BookingScope,
    subscription: Option<Subscription<Vec<Cab>>>,
    booked: Vec<Cab>,
    loading: bool,
    error: Option<String>,
}

impl BookingListView {
    pub async fn open(repo: &dyn CabRepository, scope: BookingScope) -> Self {
        match repo.watch_cabs().await {
            Ok(subscription) => Self {
                scope,
                subscription: Some(subscription),
                booked: Vec::new(),
                loading: true,
                error: None,
            },
            Err(e) => {
                error!("Cannot subscribe to bookings: {}", e);
                Self {
                    scope,
                    subscription: None,
                    booked: Vec::new(),
                    loading: false,
                    error: Some(messages::BOOKINGS_FETCH_FAILED.to_string()),
                }
            }
        }
    }

    /// Wait for the next collection snapshot and recompute the list.
    ///
    /// Returns `None` once the view no longer listens.
    pub async fn next_update(&mut self) -> Option<BookingListUpdate> {
        let subscription = self.subscription.as_mut()?;

        let update = match subscription.next().await {
            Some(Ok(cabs)) => {
                self.booked = booked_subset(&cabs, &self.scope);
                debug!("Bookings refreshed: {} booked", self.booked.len());
                BookingListUpdate::Refreshed(self.booked.clone())
            }
            Some(Err(e)) => {
                error!("Bookings listener failed: {}", e);
                self.fail()
            }
            None => {
                error!("Bookings listener closed by the store");
                self.fail()
            }
        };
        self.loading = false;
        Some(update)
    }

    fn fail(&mut self) -> BookingListUpdate {
        self.subscription = None;
        self.error = Some(messages::BOOKINGS_FETCH_FAILED.to_string());
        BookingListUpdate::Failed(messages::BOOKINGS_FETCH_FAILED.to_string())
    }

    /// Cancel a booking from this list and drop the row without waiting for
    /// the store to push the change.
    pub async fn cancel(
        &mut self,
        service: &BookingService,
        cab_id: &CabId,
        requester: Option<&str>,
    ) -> Notice {
        let result = service.cancel(cab_id, requester).await;
        if result.is_ok() {
            self.booked.retain(|cab| &cab.id != cab_id);
        }
        crate::service::cancel_notice(&result)
    }

    pub fn booked(&self) -> &[Cab] {
        &self.booked
    }

    pub fn booked_ids(&self) -> Vec<CabId> {
        self.booked.iter().map(|cab| cab.id.clone()).collect()
    }

    pub fn scope(&self) -> &BookingScope {
        &self.scope
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cabs_core::{BookOutcome, BookingEventSink, EventError, StoreError, StoreResult, TracingEventSink};
    use cabs_shared::{BookingEvent, CabStatus, NewCab};
    use cabs_store::MemoryCabStore;
    use futures_util::stream;
    use std::sync::{Arc, Mutex};

    /// Serves one snapshot per subscription and then ends the feed
    struct ClosingFeed {
        cabs: Vec<Cab>,
    }

    #[async_trait]
    impl CabRepository for ClosingFeed {
        async fn list_cabs(&self) -> StoreResult<Vec<Cab>> {
            Ok(self.cabs.clone())
        }

        async fn get_cab(&self, id: &CabId) -> StoreResult<Option<Cab>> {
            Ok(self.cabs.iter().find(|c| &c.id == id).cloned())
        }

        async fn list_by_status(&self, status: CabStatus) -> StoreResult<Vec<Cab>> {
            Ok(self.cabs.iter().filter(|c| c.status == status).cloned().collect())
        }

        async fn set_status(&self, _: &CabId, _: CabStatus, _: Option<&str>) -> StoreResult<bool> {
            Err(StoreError::Backend("read only".into()))
        }

        async fn book_within_limit(&self, _: &CabId, _: usize, _: Option<&str>) -> StoreResult<BookOutcome> {
            Err(StoreError::Backend("read only".into()))
        }

        async fn watch_cab(&self, id: &CabId) -> StoreResult<Subscription<Option<Cab>>> {
            let current = self.get_cab(id).await;
            Ok(Subscription::new(stream::iter(vec![current])))
        }

        async fn watch_cabs(&self) -> StoreResult<Subscription<Vec<Cab>>> {
            Ok(Subscription::new(stream::iter(vec![Ok(self.cabs.clone())])))
        }

        async fn insert_cab(&self, _: NewCab) -> StoreResult<CabId> {
            Err(StoreError::Backend("read only".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<BookingEvent>>,
    }

    #[async_trait]
    impl BookingEventSink for RecordingSink {
        async fn publish(&self, event: &BookingEvent) -> Result<(), EventError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn cab(id: &str, status: CabStatus, owner: Option<&str>) -> Cab {
        let mut cab = Cab::from_new(CabId::new(id), NewCab::new("Co", "Sedan"));
        cab.status = status;
        cab.booked_by = owner.map(str::to_string);
        cab
    }

    #[test]
    fn test_subset_is_exactly_the_booked_documents() {
        let cabs = vec![
            cab("1", CabStatus::Booked, Some("a")),
            cab("2", CabStatus::Available, None),
            cab("3", CabStatus::Booked, None),
            cab("4", CabStatus::Available, None),
        ];
        let ids: Vec<_> = booked_subset(&cabs, &BookingScope::All).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![CabId::new("1"), CabId::new("3")]);

        let mine = booked_subset(&cabs, &BookingScope::Requester("a".into()));
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, CabId::new("1"));
    }

    #[test]
    fn test_flipping_status_moves_document_in_and_out() {
        let mut cabs: Vec<Cab> = (0..4).map(|i| cab(&i.to_string(), CabStatus::Available, None)).collect();
        for i in 0..cabs.len() {
            cabs[i].status = CabStatus::Booked;
            assert!(booked_subset(&cabs, &BookingScope::All).iter().any(|c| c.id == cabs[i].id));
            cabs[i].status = CabStatus::Available;
            assert!(!booked_subset(&cabs, &BookingScope::All).iter().any(|c| c.id == cabs[i].id));
        }
    }

    #[tokio::test]
    async fn test_view_follows_remote_writes() {
        let store = MemoryCabStore::new();
        let a = store.insert(NewCab::new("A", "Sedan")).unwrap();
        let b = store.insert(NewCab::new("B", "Van").booked()).unwrap();

        let mut view = BookingListView::open(&store, BookingScope::All).await;
        assert!(view.is_loading());

        view.next_update().await.unwrap();
        assert!(!view.is_loading());
        assert_eq!(view.booked_ids(), vec![b.clone()]);

        store.set_status(&a, CabStatus::Booked, None).await.unwrap();
        view.next_update().await.unwrap();
        assert_eq!(view.booked_ids(), vec![a.clone(), b.clone()]);

        store.set_status(&b, CabStatus::Available, None).await.unwrap();
        view.next_update().await.unwrap();
        assert_eq!(view.booked_ids(), vec![a]);
    }

    #[tokio::test]
    async fn test_cancel_removes_row_before_next_snapshot() {
        let store = MemoryCabStore::new();
        let a = store.insert(NewCab::new("A", "Sedan").booked()).unwrap();
        let b = store.insert(NewCab::new("B", "Van").booked()).unwrap();
        let service = BookingService::new(Arc::new(store.clone()), Arc::new(TracingEventSink), 2);

        let mut view = BookingListView::open(&store, BookingScope::All).await;
        view.next_update().await;

        let notice = view.cancel(&service, &a, None).await;
        assert_eq!(notice.message, "Booking has been cancelled.");
        assert_eq!(view.booked_ids(), vec![b.clone()]);

        // The pushed snapshot agrees with the local removal
        view.next_update().await.unwrap();
        assert_eq!(view.booked_ids(), vec![b]);
    }

    #[tokio::test]
    async fn test_failed_cancel_keeps_row() {
        let store = MemoryCabStore::new();
        let a = store.insert(NewCab::new("A", "Sedan").booked()).unwrap();
        let service = BookingService::new(Arc::new(store.clone()), Arc::new(TracingEventSink), 2);

        let mut view = BookingListView::open(&store, BookingScope::All).await;
        view.next_update().await;

        store.set_offline(true);
        let notice = view.cancel(&service, &a, None).await;
        assert_eq!(notice.message, "Failed to cancel the booking.");
        assert_eq!(view.booked_ids(), vec![a]);
    }

    #[tokio::test]
    async fn test_subscription_failure() {
        let store = MemoryCabStore::new();
        let mut view = BookingListView::open(&store, BookingScope::All).await;
        view.next_update().await;

        store.set_offline(true);
        let update = view.next_update().await.unwrap();
        assert_eq!(update, BookingListUpdate::Failed("Failed to fetch booked cabs.".into()));
        assert_eq!(view.error(), Some("Failed to fetch booked cabs."));
        assert!(!view.is_listening());
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_scoped_view_only_shows_own_bookings() {
        let store = MemoryCabStore::new();
        let a = store.insert(NewCab::new("A", "Sedan")).unwrap();
        let b = store.insert(NewCab::new("B", "Van")).unwrap();
        let service = BookingService::new(Arc::new(store.clone()), Arc::new(TracingEventSink), 2);
        service.book(&a, Some("guest-1")).await.unwrap();
        service.book(&b, Some("guest-2")).await.unwrap();

        let mut view = BookingListView::open(&store, BookingScope::Requester("guest-1".into())).await;
        view.next_update().await;
        assert_eq!(view.booked_ids(), vec![a]);
    }

    #[tokio::test]
    async fn test_feed_closed_by_store_is_reported() {
        let cabs = vec![cab("1", CabStatus::Booked, None)];
        let repo = ClosingFeed { cabs };
        let mut view = BookingListView::open(&repo, BookingScope::All).await;

        let first = view.next_update().await.unwrap();
        assert!(matches!(first, BookingListUpdate::Refreshed(ref booked) if booked.len() == 1));

        let update = view.next_update().await.unwrap();
        assert_eq!(update, BookingListUpdate::Failed("Failed to fetch booked cabs.".into()));
        assert_eq!(view.error(), Some("Failed to fetch booked cabs."));
        assert!(!view.is_listening());
        assert_eq!(view.next_update().await, None);
    }

    #[tokio::test]
    async fn test_cancel_event_names_caller_in_unscoped_view() {
        let store = MemoryCabStore::new();
        let a = store.insert(NewCab::new("A", "Sedan").booked()).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let service = BookingService::new(Arc::new(store.clone()), sink.clone(), 2);

        let mut view = BookingListView::open(&store, BookingScope::All).await;
        view.next_update().await;
        view.cancel(&service, &a, Some("guest-7")).await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].requester.as_ref().map(|r| r.expose().as_str()), Some("guest-7"));
    }
}
