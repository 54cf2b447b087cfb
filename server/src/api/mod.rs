pub mod error;
pub mod stations;

pub use error::{internal_error, ApiError, ErrorResponse};

use axum::{extract::FromRef, routing::get, Json, Router};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::providers::bus_api::BusApiClient;
use crate::store::{NewStop, Stop};
use crate::sync::StationSync;

#[derive(OpenApi)]
#[openapi(
    paths(
        stations::list::list_stations,
        stations::list::create_station,
        stations::list::local_search,
        stations::list::delete_station,
        stations::sync::sync_stations,
        stations::upstream::get_arrival,
        stations::upstream::get_arrival_by_query,
        stations::upstream::search_stations,
    ),
    components(schemas(Stop, NewStop, ErrorResponse)),
    tags(
        (name = "stations", description = "Local bus stop catalog"),
        (name = "upstream", description = "Live lookups proxied to the bus information API")
    )
)]
pub struct ApiDoc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub bus_api: BusApiClient,
    pub sync: Arc<StationSync>,
}

impl AppState {
    pub fn new(pool: SqlitePool, bus_api: BusApiClient, sync_max_pages: Option<u32>) -> Self {
        let sync = StationSync::new(pool.clone(), bus_api.clone(), sync_max_pages);
        Self {
            pool,
            bus_api,
            sync: Arc::new(sync),
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for BusApiClient {
    fn from_ref(state: &AppState) -> Self {
        state.bus_api.clone()
    }
}

impl FromRef<AppState> for Arc<StationSync> {
    fn from_ref(state: &AppState) -> Self {
        state.sync.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new().nest("/stations", stations::router(state))
}

/// Full application: the API under `/api` with tracing and CORS
pub fn app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .nest("/api", router(state))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
