//! Per-farm monitoring flow: poll, classify, record, alert; and the
//! health forecast built from recorded history.

use std::sync::Arc;

use aquatrace_core::{
    FarmId, HealthPrediction, HistoricalReading, Reading, ReadingId, RiskAssessment,
    ThresholdSet, classify, predict,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::alert::AlertDispatcher;
use crate::source::ReadingSource;
use crate::storage::{FarmRegistry, ReadingRegistry};

pub const HIGH_RISK_ALERT: &str = "High Risk Detected";
pub const HIGH_RISK_THRESHOLD_NOTE: &str = "Check thresholds";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("farm {0:?} not found")]
    FarmNotFound(FarmId),
    /// The source produced nothing this poll; the caller should retry later.
    #[error("no sensor data available")]
    NoData,
    #[error("no recorded readings for farm {0:?}")]
    NoReadings(FarmId),
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
}

/// The result of a successful poll: the reading, its assessment and the
/// farm's configured thresholds.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    #[serde(flatten)]
    pub reading: Reading,
    #[serde(flatten)]
    pub risk: RiskAssessment,
    pub thresholds: ThresholdSet,
}

pub struct Monitor<F, R>
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    source: Arc<dyn ReadingSource>,
    farms: F,
    readings: R,
    alerts: Arc<AlertDispatcher>,
}

impl<F, R> Clone for Monitor<F, R>
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            farms: self.farms.clone(),
            readings: self.readings.clone(),
            alerts: Arc::clone(&self.alerts),
        }
    }
}

impl<F, R> Monitor<F, R>
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    pub fn new(
        source: Arc<dyn ReadingSource>,
        farms: F,
        readings: R,
        alerts: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            source,
            farms,
            readings,
            alerts,
        }
    }

    pub fn farms(&self) -> &F {
        &self.farms
    }

    pub fn readings(&self) -> &R {
        &self.readings
    }

    /// Runs one monitoring poll for a farm.
    ///
    /// Only a missing farm, a storage failure while loading the farm, or a
    /// source with nothing to report fail the poll. Failing to record the
    /// reading or to deliver an alert is logged and does not change the
    /// report.
    pub async fn poll(&self, farm_id: FarmId) -> Result<PollReport, MonitorError> {
        let farm = self
            .farms
            .get(farm_id)
            .await
            .map_err(|e| MonitorError::Storage(Box::new(e)))?
            .ok_or(MonitorError::FarmNotFound(farm_id))?;

        let Some(reading) = self.source.acquire().await else {
            debug!(farm = %farm.name, "No sensor data yet");
            return Err(MonitorError::NoData);
        };

        let risk = classify(reading.temperature, reading.turbidity);

        let record = HistoricalReading {
            id: ReadingId::new(),
            farm_id,
            reading: reading.clone(),
            risk: risk.level,
        };
        if let Err(e) = self.readings.store(record).await {
            error!(farm = %farm.name, error = %e, "Failed to save sensor data");
        }

        if risk.alert {
            match farm.contact_phone() {
                Some(phone) => {
                    let current = format!(
                        "Temp: {:?}°C, Turbidity: {:?} NTU",
                        reading.temperature, reading.turbidity
                    );
                    let sent = self
                        .alerts
                        .notify(
                            phone,
                            &farm.name,
                            HIGH_RISK_ALERT,
                            &current,
                            HIGH_RISK_THRESHOLD_NOTE,
                        )
                        .await;
                    info!(farm = %farm.name, sent, "High risk alert dispatched");
                }
                None => info!(farm = %farm.name, "High risk, but no contact number on file"),
            }
        }

        Ok(PollReport {
            reading,
            risk,
            thresholds: farm.thresholds,
        })
    }

    /// Forecasts health and growth from the farm's most recent recorded
    /// reading.
    pub async fn predict(&self, farm_id: FarmId) -> Result<HealthPrediction, MonitorError> {
        let farm = self
            .farms
            .get(farm_id)
            .await
            .map_err(|e| MonitorError::Storage(Box::new(e)))?
            .ok_or(MonitorError::FarmNotFound(farm_id))?;

        let latest = self
            .readings
            .latest(farm_id)
            .await
            .map_err(|e| MonitorError::Storage(Box::new(e)))?
            .ok_or(MonitorError::NoReadings(farm_id))?;

        Ok(predict(
            farm.species.as_deref(),
            latest.reading.temperature,
            latest.reading.oxygen,
            latest.reading.ammonia,
        ))
    }

    /// Recorded readings for a farm, newest first.
    pub async fn history(
        &self,
        farm_id: FarmId,
        limit: usize,
    ) -> Result<Vec<HistoricalReading>, MonitorError> {
        self.farms
            .get(farm_id)
            .await
            .map_err(|e| MonitorError::Storage(Box::new(e)))?
            .ok_or(MonitorError::FarmNotFound(farm_id))?;

        self.readings
            .list_recent(farm_id, limit)
            .await
            .map_err(|e| MonitorError::Storage(Box::new(e)))
    }
}
