pub mod app_config;
pub mod events;
pub mod memory_repo;
pub mod redis_repo;
pub mod seed;

pub use events::EventProducer;
pub use memory_repo::MemoryCabStore;
pub use redis_repo::RedisCabStore;

use std::sync::Arc;

use app_config::{StoreBackend, StoreConfig};
use cabs_core::{CabRepository, StoreError};
use tracing::info;

/// Open the backend named in configuration
pub fn connect(config: &StoreConfig) -> Result<Arc<dyn CabRepository>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory cab store");
            Ok(Arc::new(MemoryCabStore::new()))
        }
        StoreBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                StoreError::Backend("store.redis_url is required for the redis backend".to_string())
            })?;
            info!("Using redis cab store (namespace {})", config.namespace);
            let store = RedisCabStore::new(url, &config.namespace)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}
