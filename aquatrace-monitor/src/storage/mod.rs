pub mod memory;
pub mod sqlite;

use aquatrace_core::{Farm, FarmId, HistoricalReading};
use async_trait::async_trait;

pub use memory::MemoryStorage;
pub use sqlite::{SqliteStorage, SqliteStorageError};

/// Farms and their owner contact details and thresholds.
#[async_trait]
pub trait FarmRegistry: Send + Sync + Clone + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts the farm, replacing any farm with the same id.
    async fn register(&self, farm: Farm) -> Result<(), Self::Error>;

    async fn get(&self, id: FarmId) -> Result<Option<Farm>, Self::Error>;
}

/// Historical readings recorded per farm.
#[async_trait]
pub trait ReadingRegistry: Send + Sync + Clone + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn store(&self, reading: HistoricalReading) -> Result<(), Self::Error>;

    /// The most recently captured reading for a farm.
    async fn latest(&self, farm_id: FarmId) -> Result<Option<HistoricalReading>, Self::Error>;

    /// Up to `limit` readings for a farm, newest first.
    async fn list_recent(
        &self,
        farm_id: FarmId,
        limit: usize,
    ) -> Result<Vec<HistoricalReading>, Self::Error>;
}
