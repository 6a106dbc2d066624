use cabs_core::notice::messages;
use cabs_core::{CabRepository, Notice, Subscription};
use cabs_shared::{Cab, CabId};
use serde::Serialize;
use tracing::{debug, error, warn};

/// Outcome of one pushed update on the detail screen
#[derive(Debug, Clone, PartialEq)]
pub enum DetailUpdate {
    Updated(Cab),
    /// The document is gone; the previously shown record is kept
    Missing(Notice),
    /// The listener failed and has been released
    Failed(Notice),
}

/// Fields rendered by the detail screen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CabDetails {
    pub id: CabId,
    pub company_name: String,
    pub car_model: String,
    pub passenger_capacity: u32,
    pub rating: f64,
    pub cost_per_hour: String,
    pub status_label: &'static str,
    pub can_book: bool,
}

impl From<&Cab> for CabDetails {
    fn from(cab: &Cab) -> Self {
        Self {
            id: cab.id.clone(),
            company_name: cab.company_name.clone(),
            car_model: cab.car_model.clone(),
            passenger_capacity: cab.passenger_capacity,
            rating: cab.rating,
            cost_per_hour: cab.cost_label(),
            status_label: cab.status.label(),
            can_book: !cab.is_booked(),
        }
    }
}

/// Live view of a single cab document.
///
/// Loading until the first snapshot arrives. The store listener lives exactly
/// as long as this view: dropping it or calling [`CabDetailView::close`]
/// releases the listener.
pub struct CabDetailView {
    cab_id: CabId,
    subscription: Option<Subscription<Option<Cab>>>,
    current: Option<Cab>,
    error: Option<Notice>,
}

impl CabDetailView {
    pub async fn open(repo: &dyn CabRepository, cab_id: CabId) -> Self {
        let (subscription, error) = match repo.watch_cab(&cab_id).await {
            Ok(sub) => {
                debug!("Listening to cab {}", cab_id);
                (Some(sub), None)
            }
            Err(e) => {
                error!("Cannot subscribe to cab {}: {}", cab_id, e);
                (None, Some(Notice::error(messages::DETAIL_FETCH_FAILED)))
            }
        };

        Self {
            cab_id,
            subscription,
            current: None,
            error,
        }
    }

    /// Wait for the next remote change and apply it.
    ///
    /// A feed that ends on its own is reported as a failure. Returns `None`
    /// once the view no longer listens.
    pub async fn next_update(&mut self) -> Option<DetailUpdate> {
        let subscription = self.subscription.as_mut()?;

        match subscription.next().await {
            Some(Ok(Some(cab))) => {
                self.current = Some(cab.clone());
                self.error = None;
                Some(DetailUpdate::Updated(cab))
            }
            Some(Ok(None)) => {
                warn!("Cab {} not found", self.cab_id);
                let notice = Notice::error(messages::CAB_NOT_FOUND);
                self.error = Some(notice.clone());
                Some(DetailUpdate::Missing(notice))
            }
            Some(Err(e)) => {
                error!("Cab {} listener failed: {}", self.cab_id, e);
                Some(self.fail())
            }
            // The view holds the only handle, so an ended feed means the backend dropped it
            None => {
                error!("Cab {} listener closed by the store", self.cab_id);
                Some(self.fail())
            }
        }
    }

    fn fail(&mut self) -> DetailUpdate {
        self.subscription = None;
        let notice = Notice::error(messages::DETAIL_FETCH_FAILED);
        self.error = Some(notice.clone());
        DetailUpdate::Failed(notice)
    }

    pub fn cab_id(&self) -> &CabId {
        &self.cab_id
    }

    pub fn is_loading(&self) -> bool {
        self.current.is_none()
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn current(&self) -> Option<&Cab> {
        self.current.as_ref()
    }

    pub fn details(&self) -> Option<CabDetails> {
        self.current.as_ref().map(CabDetails::from)
    }

    /// The book action is offered only for a loaded, available cab
    pub fn can_book(&self) -> bool {
        self.current.as_ref().is_some_and(|cab| !cab.is_booked())
    }

    pub fn error(&self) -> Option<&Notice> {
        self.error.as_ref()
    }

    pub fn close(self) {
        debug!("Closing detail view for cab {}", self.cab_id);
    }
}
