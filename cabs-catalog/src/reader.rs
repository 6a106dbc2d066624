use cabs_core::notice::messages;
use cabs_core::CabRepository;
use cabs_shared::{Cab, CabId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// What the catalog screen currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogState {
    Loading,
    Loaded(Vec<Cab>),
    Failed(String),
}

/// One line of the catalog list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRow {
    pub id: CabId,
    pub company_name: String,
    pub car_model: String,
    pub status_label: &'static str,
}

impl From<&Cab> for CatalogRow {
    fn from(cab: &Cab) -> Self {
        Self {
            id: cab.id.clone(),
            company_name: cab.company_name.clone(),
            car_model: cab.car_model.clone(),
            status_label: cab.status.label(),
        }
    }
}

/// Reads the whole collection each time the catalog screen gains focus.
///
/// Nothing is cached across visits; a failed read is final for that visit.
pub struct CatalogReader {
    repo: Arc<dyn CabRepository>,
    state: CatalogState,
}

impl CatalogReader {
    pub fn new(repo: Arc<dyn CabRepository>) -> Self {
        Self {
            repo,
            state: CatalogState::Loading,
        }
    }

    /// Issue a one-shot read and replace the list
    pub async fn on_focus(&mut self) -> &CatalogState {
        self.state = match self.repo.list_cabs().await {
            Ok(cabs) => {
                info!("Catalog loaded {} cabs", cabs.len());
                CatalogState::Loaded(cabs)
            }
            Err(e) => {
                error!("Catalog fetch failed: {}", e);
                CatalogState::Failed(messages::CATALOG_FETCH_FAILED.to_string())
            }
        };
        &self.state
    }

    pub fn state(&self) -> &CatalogState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, CatalogState::Loading)
    }

    pub fn cabs(&self) -> &[Cab] {
        match &self.state {
            CatalogState::Loaded(cabs) => cabs,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            CatalogState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn rows(&self) -> Vec<CatalogRow> {
        self.cabs().iter().map(CatalogRow::from).collect()
    }

    /// Record handed to the detail screen when a row is selected
    pub fn select(&self, id: &CabId) -> Option<&Cab> {
        self.cabs().iter().find(|c| &c.id == id)
    }
}
