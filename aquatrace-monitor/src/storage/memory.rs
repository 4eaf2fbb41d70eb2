use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use aquatrace_core::{Farm, FarmId, HistoricalReading, ReadingId};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{FarmRegistry, ReadingRegistry};

/// In memory storage implementation.
/// This is primarily intended for testing and as a reference
/// implementation of the storage traits.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    farms: Arc<RwLock<HashMap<FarmId, Farm>>>,
    readings: Arc<RwLock<HashMap<ReadingId, HistoricalReading>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FarmRegistry for MemoryStorage {
    type Error = Infallible;

    async fn register(&self, farm: Farm) -> Result<(), Self::Error> {
        let mut farms = self.farms.write().await;
        let _ = farms.insert(farm.id, farm);
        Ok(())
    }

    async fn get(&self, id: FarmId) -> Result<Option<Farm>, Self::Error> {
        let farms = self.farms.read().await;
        Ok(farms.get(&id).cloned())
    }
}

#[async_trait]
impl ReadingRegistry for MemoryStorage {
    type Error = Infallible;

    async fn store(&self, reading: HistoricalReading) -> Result<(), Self::Error> {
        let mut readings = self.readings.write().await;
        let _ = readings.insert(reading.id, reading);
        Ok(())
    }

    async fn latest(&self, farm_id: FarmId) -> Result<Option<HistoricalReading>, Self::Error> {
        let readings = self.readings.read().await;
        Ok(readings
            .values()
            .filter(|r| r.farm_id == farm_id)
            .max_by_key(|r| (r.reading.timestamp, r.id.0))
            .cloned())
    }

    async fn list_recent(
        &self,
        farm_id: FarmId,
        limit: usize,
    ) -> Result<Vec<HistoricalReading>, Self::Error> {
        let readings = self.readings.read().await;
        let mut matching: Vec<&HistoricalReading> =
            readings.values().filter(|r| r.farm_id == farm_id).collect();

        matching.sort_by(|a, b| {
            (b.reading.timestamp, b.id.0).cmp(&(a.reading.timestamp, a.id.0))
        });

        Ok(matching.into_iter().take(limit).cloned().collect())
    }
}
