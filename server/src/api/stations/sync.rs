use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::error;

use crate::sync::StationSync;

/// Copy every upstream stop not yet stored into the local catalog
#[utoipa::path(
    post,
    path = "/api/stations/sync",
    responses(
        (status = 200, description = "\"saved N stops\"", body = String),
        (status = 500, description = "\"error: <message>\"; nothing from the run is kept", body = String)
    ),
    tag = "stations"
)]
pub async fn sync_stations(State(sync): State<Arc<StationSync>>) -> (StatusCode, String) {
    // Spawned so a client disconnect does not cancel the run halfway
    let run = tokio::spawn(async move { sync.report().await });

    match run.await {
        Ok(Ok(report)) => (StatusCode::OK, report),
        Ok(Err(report)) => (StatusCode::INTERNAL_SERVER_ERROR, report),
        Err(e) => {
            error!(error = %e, "Station sync task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {}", e))
        }
    }
}
