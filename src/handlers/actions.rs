//! Per-process action endpoints: termination and detail lookup.
//!
//! Failures are part of the response body, never HTTP-level surprises: the
//! consumer shows the message to a human.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::actions::{get_process_details, terminate_process};
use crate::error::ProcError;
use crate::state::SharedState;

/// Sentinel rendered for individually denied detail fields.
const ACCESS_DENIED: &str = "Access Denied";

/// Handler for POST /processes/{pid}/terminate.
#[instrument(skip(state))]
pub async fn terminate_handler(
    State(state): State<SharedState>,
    Path(pid): Path<u32>,
) -> impl IntoResponse {
    state.health_stats.record_request();

    let body = match tokio::task::spawn_blocking(move || terminate_process(pid)).await {
        Ok(Ok(message)) => json!({ "success": true, "message": message }),
        Ok(Err(e)) => {
            warn!("terminate pid {}: {}", pid, e);
            let message = match &e {
                ProcError::AccessDenied(_) => format!(
                    "Error terminating process {}: access denied; try elevated privileges.",
                    pid
                ),
                other => format!("Error terminating process {}: {}", pid, other),
            };
            json!({ "success": false, "message": message })
        }
        Err(e) => {
            warn!("terminate task failed for pid {}: {}", pid, e);
            json!({ "success": false, "message": format!("Error terminating process {}", pid) })
        }
    };
    Json(body)
}

/// Handler for GET /processes/{pid}.
///
/// Denied fields are replaced with the "Access Denied" sentinel; the call
/// fails as a whole only when the process cannot be addressed.
#[instrument(skip(state))]
pub async fn details_handler(
    State(state): State<SharedState>,
    Path(pid): Path<u32>,
) -> impl IntoResponse {
    state.health_stats.record_request();
    debug!("Processing /processes/{} request", pid);

    let worker_state = state.clone();
    let result =
        tokio::task::spawn_blocking(move || get_process_details(worker_state.collector.reader(), pid))
            .await;

    match result {
        Ok(Ok(details)) => {
            let body = json!({
                "start_time": details
                    .start_time
                    .map(serde_json::Value::from)
                    .unwrap_or_else(|| ACCESS_DENIED.into()),
                "user": details.user.unwrap_or_else(|| ACCESS_DENIED.to_string()),
                "threads": details
                    .threads
                    .map(serde_json::Value::from)
                    .unwrap_or_else(|| ACCESS_DENIED.into()),
            });
            (StatusCode::OK, Json(body))
        }
        Ok(Err(ProcError::NotFound(_))) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Process {} has terminated.", pid) })),
        ),
        Ok(Err(ProcError::AccessDenied(_))) => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": format!(
                    "Access denied to process {} details. Try elevated privileges.",
                    pid
                )
            })),
        ),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Unexpected error: {}", e) })),
        ),
        Err(e) => {
            warn!("details task failed for pid {}: {}", pid, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Detail lookup failed" })),
            )
        }
    }
}
