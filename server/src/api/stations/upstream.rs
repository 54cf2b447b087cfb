//! Live lookups proxied to the bus information API.
//!
//! Responses are the upstream XML decoded to JSON. Any upstream failure is
//! logged and answered with `502` and a JSON `null` body; callers cannot tell
//! transport, status and parse failures apart.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::warn;
use utoipa::IntoParams;

use crate::providers::bus_api::{BusApiClient, UpstreamError};
use crate::providers::xml::Node;

type ProxyResponse = (StatusCode, Json<Option<Node>>);

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Name to search for upstream
    pub keyword: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArrivalQuery {
    /// Stop code
    #[serde(rename = "arsId")]
    pub ars_id: String,
}

fn proxied(operation: &str, result: Result<Node, UpstreamError>) -> ProxyResponse {
    match result {
        Ok(root) => (StatusCode::OK, Json(Some(root))),
        Err(e) => {
            warn!(operation, error = %e, "Bus API request failed");
            (StatusCode::BAD_GATEWAY, Json(None))
        }
    }
}

/// Live arrivals at a stop
#[utoipa::path(
    get,
    path = "/api/stations/arrival/{arsId}",
    params(
        ("arsId" = String, Path, description = "Stop code")
    ),
    responses(
        (status = 200, description = "Upstream arrival response as JSON"),
        (status = 502, description = "Upstream failed; body is null")
    ),
    tag = "upstream"
)]
pub async fn get_arrival(
    State(client): State<BusApiClient>,
    Path(ars_id): Path<String>,
) -> ProxyResponse {
    proxied("arrival", client.arrivals(&ars_id).await)
}

/// Live arrivals at a stop, stop code given as `?arsId=`
#[utoipa::path(
    get,
    path = "/api/stations/arrival",
    params(ArrivalQuery),
    responses(
        (status = 200, description = "Upstream arrival response as JSON"),
        (status = 502, description = "Upstream failed; body is null")
    ),
    tag = "upstream"
)]
pub async fn get_arrival_by_query(
    State(client): State<BusApiClient>,
    Query(query): Query<ArrivalQuery>,
) -> ProxyResponse {
    proxied("arrival", client.arrivals(&query.ars_id).await)
}

/// Search stops by name upstream
#[utoipa::path(
    get,
    path = "/api/stations/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Upstream search response as JSON"),
        (status = 502, description = "Upstream failed; body is null")
    ),
    tag = "upstream"
)]
pub async fn search_stations(
    State(client): State<BusApiClient>,
    Query(query): Query<SearchQuery>,
) -> ProxyResponse {
    proxied("search", client.search_stations(&query.keyword).await)
}
