pub mod farms;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use crate::monitor::Monitor;
use crate::storage::{FarmRegistry, ReadingRegistry};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState<F, R>
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    pub monitor: Monitor<F, R>,
}

/// JSON body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: jiff::Timestamp,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    let body = Envelope {
        success: true,
        data: Some(data),
        error: None,
        timestamp: jiff::Timestamp::now(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    let body: Envelope<()> = Envelope {
        success: false,
        data: None,
        error: Some(message.into()),
        timestamp: jiff::Timestamp::now(),
    };
    (status, Json(body)).into_response()
}

/// Create the full API router with all endpoints.
pub fn api_router<F, R>(monitor: Monitor<F, R>) -> Router
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    let state = ApiState { monitor };

    Router::new()
        .route("/api/data/{farm_id}", get(farms::poll_farm::<F, R>))
        .route("/api/predict/{farm_id}", get(farms::predict_farm::<F, R>))
        .route(
            "/api/farms/{farm_id}/readings",
            get(farms::list_readings::<F, R>),
        )
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
