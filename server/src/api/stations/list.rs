use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use utoipa::IntoParams;

use crate::api::{error::store_error, ApiError, ErrorResponse};
use crate::store::{self, NewStop, Stop};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct KeywordQuery {
    /// Substring of the stop name
    pub keyword: Option<String>,
}

/// List every stored stop
#[utoipa::path(
    get,
    path = "/api/stations",
    responses(
        (status = 200, description = "All stored stops", body = [Stop]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn list_stations(State(pool): State<SqlitePool>) -> Result<Json<Vec<Stop>>, ApiError> {
    let stops = store::list_all(&pool).await.map_err(store_error)?;
    Ok(Json(stops))
}

/// Store a single stop
#[utoipa::path(
    post,
    path = "/api/stations",
    request_body = NewStop,
    responses(
        (status = 200, description = "The stored stop with its assigned id", body = Stop),
        (status = 400, description = "arsId is empty or \"0\"", body = ErrorResponse),
        (status = 409, description = "A stop with this arsId already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn create_station(
    State(pool): State<SqlitePool>,
    Json(stop): Json<NewStop>,
) -> Result<Json<Stop>, ApiError> {
    let stored = store::insert(&pool, &stop).await.map_err(store_error)?;
    info!(id = stored.id, ars_id = %stored.ars_id, "Stored stop");
    Ok(Json(stored))
}

/// Search stored stops by name
#[utoipa::path(
    get,
    path = "/api/stations/local-search",
    params(KeywordQuery),
    responses(
        (status = 200, description = "Stops whose name contains the keyword; empty for a blank keyword", body = [Stop]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn local_search(
    State(pool): State<SqlitePool>,
    Query(query): Query<KeywordQuery>,
) -> Result<Json<Vec<Stop>>, ApiError> {
    let keyword = query.keyword.unwrap_or_default();
    let stops = store::search_by_name(&pool, &keyword)
        .await
        .map_err(store_error)?;
    Ok(Json(stops))
}

/// Delete a stored stop; unknown ids succeed too
#[utoipa::path(
    delete,
    path = "/api/stations/{id}",
    params(
        ("id" = i64, Path, description = "Stop id")
    ),
    responses(
        (status = 200, description = "Deleted", body = String),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn delete_station(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<&'static str, ApiError> {
    store::delete_by_id(&pool, id).await.map_err(store_error)?;
    info!(id, "Deleted stop");
    Ok("deleted")
}
