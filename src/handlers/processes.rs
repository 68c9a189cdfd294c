//! Process table endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::state::SharedState;
use crate::view::to_display_rows;

/// Handler for the /processes endpoint.
///
/// The collection pass runs on a blocking worker because it walks the whole
/// process table; the snapshot cache makes it a no-op while data is fresh.
#[instrument(skip(state))]
pub async fn processes_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let start = Instant::now();
    debug!("Processing /processes request");
    state.health_stats.record_request();

    let passes_before = state.cache.pass_count();
    let worker_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        worker_state.cache.get_process_data(&worker_state.collector)
    })
    .await;

    let snapshot = match result {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            // Stale-but-valid beats no data; fall back to the last snapshot.
            match state.cache.current() {
                Some(stale) => {
                    warn!("collection failed, serving stale snapshot: {}", e);
                    stale
                }
                None => {
                    error!("collection failed with no snapshot to fall back to: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("process collection failed: {}", e),
                    )
                        .into_response();
                }
            }
        }
        Err(e) => {
            error!("collection task panicked: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "process collection failed".to_string(),
            )
                .into_response();
        }
    };

    if state.cache.pass_count() > passes_before {
        state
            .health_stats
            .record_pass(snapshot.len() as u64, start.elapsed().as_secs_f64());
    }

    debug!(
        "/processes: {} records in {:.2}ms",
        snapshot.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Json(to_display_rows(&snapshot.records)).into_response()
}
