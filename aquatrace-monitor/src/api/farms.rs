use aquatrace_core::FarmId;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use ulid::Ulid;

use crate::monitor::MonitorError;
use crate::storage::{FarmRegistry, ReadingRegistry};

use super::{ApiState, fail, ok};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn parse_farm_id(id: &str) -> Result<FarmId, Response> {
    id.parse::<Ulid>()
        .map(FarmId)
        .map_err(|_| fail(StatusCode::BAD_REQUEST, "Invalid farm ID"))
}

/// Poll the sensors for a farm and return the classified reading.
///
/// GET /api/data/:farm_id
pub async fn poll_farm<F, R>(
    State(state): State<ApiState<F, R>>,
    Path(id): Path<String>,
) -> Response
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    let farm_id = match parse_farm_id(&id) {
        Ok(farm_id) => farm_id,
        Err(response) => return response,
    };

    match state.monitor.poll(farm_id).await {
        Ok(report) => ok(report),
        Err(MonitorError::FarmNotFound(_)) => fail(StatusCode::NOT_FOUND, "Farm not found"),
        Err(MonitorError::NoData | MonitorError::NoReadings(_)) => {
            fail(StatusCode::SERVICE_UNAVAILABLE, "No sensor data available")
        }
        Err(e) => {
            tracing::error!(error = ?e, "Failed to poll farm");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to poll farm")
        }
    }
}

/// Health and growth forecast from the latest recorded reading.
///
/// GET /api/predict/:farm_id
pub async fn predict_farm<F, R>(
    State(state): State<ApiState<F, R>>,
    Path(id): Path<String>,
) -> Response
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    let farm_id = match parse_farm_id(&id) {
        Ok(farm_id) => farm_id,
        Err(response) => return response,
    };

    match state.monitor.predict(farm_id).await {
        Ok(prediction) => ok(prediction),
        Err(MonitorError::FarmNotFound(_)) => fail(StatusCode::NOT_FOUND, "Farm not found"),
        Err(MonitorError::NoReadings(_) | MonitorError::NoData) => {
            fail(StatusCode::NOT_FOUND, "No sensor data available yet")
        }
        Err(e) => {
            tracing::error!(error = ?e, "Failed to predict growth");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to predict growth")
        }
    }
}

/// Recorded readings, newest first.
///
/// GET /api/farms/:farm_id/readings?limit=N
pub async fn list_readings<F, R>(
    State(state): State<ApiState<F, R>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    let farm_id = match parse_farm_id(&id) {
        Ok(farm_id) => farm_id,
        Err(response) => return response,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    match state.monitor.history(farm_id, limit).await {
        Ok(readings) => ok(readings),
        Err(MonitorError::FarmNotFound(_)) => fail(StatusCode::NOT_FOUND, "Farm not found"),
        Err(e) => {
            tracing::error!(error = ?e, "Failed to list readings");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list readings")
        }
    }
}
