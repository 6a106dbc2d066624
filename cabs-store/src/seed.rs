use cabs_core::{CabRepository, StoreError};
use cabs_shared::{CabId, NewCab};
use std::path::Path;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Cannot read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid seed data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Seeding failed: {0}")]
    Store(#[from] StoreError),
}

/// Parse a JSON array of cab documents
pub fn parse_seed(json: &str) -> Result<Vec<NewCab>, SeedError> {
    Ok(serde_json::from_str(json)?)
}

pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<NewCab>, SeedError> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_seed(&raw)
}

/// Insert every document, returning the store-assigned ids in input order
pub async fn seed_repository(
    repo: &dyn CabRepository,
    cabs: Vec<NewCab>,
) -> Result<Vec<CabId>, SeedError> {
    let mut ids = Vec::with_capacity(cabs.len());
    for cab in cabs {
        ids.push(repo.insert_cab(cab).await?);
    }
    info!("Seeded {} cabs", ids.len());
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCabStore;
    use cabs_shared::CabStatus;

    const SEED: &str = r#"[
        {"companyName":"Yellow Co","carModel":"Camry","passengerCapacity":4,"rating":4.6,"costPerHour":45.0,"status":false},
        {"companyName":"Metro","carModel":"Prius","passengerCapacity":4,"rating":4.1,"costPerHour":38.5,"status":true},
        {"companyName":"Lux","carModel":"BMW M3","passengerCapacity":3,"rating":4.9,"costPerHour":90.0}
    ]"#;

    #[test]
    fn test_parse_seed() {
        let cabs = parse_seed(SEED).unwrap();
        assert_eq!(cabs.len(), 3);
        assert_eq!(cabs[1].status, CabStatus::Booked);
        assert_eq!(cabs[2].status, CabStatus::Available);
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert!(matches!(parse_seed(r#"[{"companyName":1}]"#), Err(SeedError::Parse(_))));
    }

    #[tokio::test]
    async fn test_seed_assigns_ids() {
        let store = MemoryCabStore::new();
        let ids = seed_repository(&store, parse_seed(SEED).unwrap()).await.unwrap();

        let listed = store.list_cabs().await.unwrap();
        assert_eq!(listed.len(), 3);
        let listed_ids: Vec<_> = listed.iter().map(|c| c.id.clone()).collect();
        assert_eq!(listed_ids, ids);
    }
}
