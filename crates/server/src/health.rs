use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use catalog_core::health::{HealthReporter, ServingStatus};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

#[derive(Clone)]
pub struct HealthState {
    reporter: Arc<dyn HealthReporter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: ServingStatus,
    pub service: &'static str,
    pub checked_at: String,
}

pub fn router(reporter: Arc<dyn HealthReporter>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { reporter })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let status = state.reporter.check();
    debug!(event_name = "system.health.check", status = status.as_str(), "health checked");

    let payload = HealthResponse {
        status,
        service: "product-catalog",
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = match status {
        ServingStatus::Serving => StatusCode::OK,
        ServingStatus::NotServing => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(payload))
}
