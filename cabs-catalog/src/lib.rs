pub mod detail;
pub mod reader;

pub use detail::{CabDetails, CabDetailView, DetailUpdate};
pub use reader::{CatalogReader, CatalogRow, CatalogState};
