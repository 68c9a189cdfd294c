//! System-wide CPU endpoint handler.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use tracing::instrument;

use crate::state::SharedState;

/// Handler for the /system endpoint. Reads the value last published by the
/// background sampler; never blocks on a sample in flight.
#[instrument(skip(state))]
pub async fn system_handler(State(state): State<SharedState>) -> impl IntoResponse {
    state.health_stats.record_request();
    Json(json!({ "cpu_percent": state.cpu_sampler.current() }))
}
