pub mod list;
pub mod sync;
pub mod upstream;

use axum::{
    routing::{delete, get},
    Router,
};

use crate::api::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list::list_stations).post(list::create_station))
        .route("/sync", axum::routing::post(sync::sync_stations))
        .route("/local-search", get(list::local_search))
        .route("/search", get(upstream::search_stations))
        .route("/arrival", get(upstream::get_arrival_by_query))
        .route("/arrival/{ars_id}", get(upstream::get_arrival))
        .route("/{id}", delete(list::delete_station))
        .with_state(state)
}
