#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bus_server::api::{self, AppState};
use bus_server::config::Config;
use bus_server::db;
use bus_server::providers::bus_api::BusApiClient;
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const SERVICE_KEY: &str = "test-key";
pub const ORIGIN: &str = "http://localhost:5173";

/// What the mock upstream answers with
#[derive(Debug, Clone)]
pub enum Reply {
    Xml(String),
    Status(u16),
}

#[derive(Default)]
struct MockState {
    pages: Vec<Reply>,
    search: Option<Reply>,
    arrival: Option<Reply>,
    requests: Vec<HashMap<String, String>>,
}

/// In-process stand-in for the bus information API
#[derive(Clone, Default)]
pub struct MockUpstream {
    state: Arc<Mutex<MockState>>,
}

impl MockUpstream {
    /// Enumeration pages served for `pageNo` 1, 2, ...; later pages are empty
    pub fn set_pages(&self, pages: Vec<Reply>) {
        self.state.lock().unwrap().pages = pages;
    }

    pub fn set_search(&self, reply: Reply) {
        self.state.lock().unwrap().search = Some(reply);
    }

    pub fn set_arrival(&self, reply: Reply) {
        self.state.lock().unwrap().arrival = Some(reply);
    }

    /// Query parameters of every request received so far
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    /// Serve on an ephemeral local port; returns the base URL
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/stationinfo/getStationByName", get(station_by_name))
            .route("/stationinfo/getStationByUid", get(station_by_uid))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }
}

fn respond(reply: Reply) -> Response {
    match reply {
        Reply::Xml(xml) => ([(header::CONTENT_TYPE, "application/xml;charset=UTF-8")], xml).into_response(),
        Reply::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
    }
}

async fn station_by_name(
    State(mock): State<MockUpstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = mock.state.lock().unwrap();
    state.requests.push(params.clone());

    let keyword = params.get("stSrch").cloned().unwrap_or_default();
    if !keyword.is_empty() {
        return respond(state.search.clone().unwrap_or_else(|| Reply::Xml(page_xml(&[]))));
    }

    let page: usize = params.get("pageNo").and_then(|p| p.parse().ok()).unwrap_or(1);
    let reply = state
        .pages
        .get(page.saturating_sub(1))
        .cloned()
        .unwrap_or_else(|| Reply::Xml(page_xml(&[])));
    respond(reply)
}

async fn station_by_uid(
    State(mock): State<MockUpstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = mock.state.lock().unwrap();
    state.requests.push(params);
    respond(state.arrival.clone().unwrap_or_else(|| Reply::Xml(page_xml(&[]))))
}

pub fn item_xml(ars_id: &str, name: &str, station_id: &str) -> String {
    format!(
        "<itemList><arsId>{ars_id}</arsId><posX>198017.9</posX><posY>451853.4</posY>\
         <stId>{station_id}</stId><stNm>{name}</stNm><tmX>126.9</tmX><tmY>37.5</tmY></itemList>"
    )
}

/// A full response envelope; no items gives `<msgBody/>`
pub fn page_xml(items: &[String]) -> String {
    let body = if items.is_empty() {
        "<msgBody/>".to_string()
    } else {
        format!("<msgBody>{}</msgBody>", items.concat())
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <ServiceResult><comMsgHeader/><msgHeader><headerCd>0</headerCd>\
         <headerMsg>정상적으로 처리되었습니다.</headerMsg><itemCount>{}</itemCount></msgHeader>{}</ServiceResult>",
        items.len(),
        body
    )
}

pub fn page(items: &[String]) -> Reply {
    Reply::Xml(page_xml(items))
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub upstream: MockUpstream,
}

pub async fn test_app() -> TestApp {
    test_app_with(None).await
}

pub async fn test_app_with(sync_max_pages: Option<u32>) -> TestApp {
    let upstream = MockUpstream::default();
    let base_url = upstream.spawn().await;
    let (router, pool) = app_for(&base_url, sync_max_pages).await;
    TestApp {
        router,
        pool,
        upstream,
    }
}

/// The application against an arbitrary upstream base URL
pub async fn app_for(base_url: &str, sync_max_pages: Option<u32>) -> (Router, SqlitePool) {
    let config = Config::from_yaml(&format!(
        "service-key: {SERVICE_KEY}\nallowed-origin: {ORIGIN}\n"
    ))
    .unwrap();

    let pool = db::connect("sqlite::memory:").await.unwrap();
    let bus_api = BusApiClient::new(base_url, SERVICE_KEY, Duration::from_secs(5)).unwrap();
    let state = AppState::new(pool.clone(), bus_api, sync_max_pages);

    (api::app(state, config.cors_layer().unwrap()), pool)
}

pub async fn send(router: &Router, method: Method, uri: &str, json: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match json {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

pub async fn send_text(router: &Router, method: Method, uri: &str) -> (StatusCode, String) {
    let (status, body) = send(router, method, uri, None).await;
    (status, String::from_utf8(body).unwrap())
}

pub async fn send_json(
    router: &Router,
    method: Method,
    uri: &str,
    json: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(router, method, uri, json).await;
    (status, serde_json::from_slice(&body).unwrap())
}

pub async fn sync(router: &Router) -> (StatusCode, String) {
    send_text(router, Method::POST, "/api/stations/sync").await
}

pub async fn stored(router: &Router) -> Vec<serde_json::Value> {
    let (status, body) = send_json(router, Method::GET, "/api/stations", None).await;
    assert_eq!(status, StatusCode::OK);
    body.as_array().unwrap().clone()
}
