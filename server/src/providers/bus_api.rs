/// Seoul bus information API client
///
/// Thin wrapper over the municipal `ws.bus.go.kr` REST service. Every request
/// carries the configured `serviceKey` query parameter and every response is
/// XML, decoded here into a generic [`Node`] tree.
///
/// ## Endpoints
/// - `stationinfo/getStationByName` - `stSrch` name search; an empty `stSrch`
///   enumerates every stop, paged with `numOfRows` and `pageNo`
/// - `stationinfo/getStationByUid` - live arrivals at the stop `arsId`
///
/// ## Envelope
/// ```text
/// <ServiceResult>
///   <msgHeader><headerCd/><headerMsg/><itemCount/></msgHeader>
///   <msgBody><itemList>...</itemList>...</msgBody>
/// </ServiceResult>
/// ```
use std::time::Duration;

use tracing::{debug, error};

use super::xml::{self, Node};

pub const DEFAULT_BASE_URL: &str = "http://ws.bus.go.kr/api/rest";

const STATION_BY_NAME: &str = "stationinfo/getStationByName";
const STATION_BY_UID: &str = "stationinfo/getStationByUid";

#[derive(Debug, Clone)]
pub struct BusApiClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

/// Fields of `msgHeader`, logged by callers to surface upstream diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub code: String,
    pub message: String,
    pub item_count: String,
}

impl ResponseHeader {
    pub fn from_root(root: &Node) -> Option<Self> {
        let header = root.path("msgHeader");
        if header.is_missing() {
            return None;
        }
        Some(Self {
            code: header.path("headerCd").text().to_string(),
            message: header.path("headerMsg").text().to_string(),
            item_count: header.path("itemCount").text().to_string(),
        })
    }
}

impl BusApiClient {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    /// One page of the full stop enumeration
    pub async fn station_page(&self, page: u32, rows: u32) -> Result<Node, UpstreamError> {
        let rows = rows.to_string();
        let page = page.to_string();
        self.get(
            STATION_BY_NAME,
            &[("stSrch", ""), ("numOfRows", &rows), ("pageNo", &page)],
        )
        .await
    }

    pub async fn search_stations(&self, keyword: &str) -> Result<Node, UpstreamError> {
        self.get(STATION_BY_NAME, &[("stSrch", keyword)]).await
    }

    pub async fn arrivals(&self, ars_id: &str) -> Result<Node, UpstreamError> {
        self.get(STATION_BY_UID, &[("arsId", ars_id)]).await
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Node, UpstreamError> {
        let url = self.build_url(endpoint, params);
        let body = self.fetch(endpoint, &url).await?;

        xml::decode(&body).map_err(|e| {
            error!(
                endpoint,
                error = %e,
                body_preview = %String::from_utf8_lossy(&body).chars().take(200).collect::<String>(),
                "Failed to parse bus API response"
            );
            UpstreamError::Malformed(e.to_string())
        })
    }

    /// Full request URL including the service key; never log the result.
    pub fn build_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{}?serviceKey={}",
            self.base_url,
            endpoint,
            urlencoding::encode(&self.service_key)
        );
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// GET `url` and return the raw body.
    ///
    /// `endpoint` is what gets logged since `url` embeds the service key.
    pub async fn fetch(&self, endpoint: &str, url: &str) -> Result<Vec<u8>, UpstreamError> {
        debug!(endpoint, "Requesting bus API");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            let preview = String::from_utf8_lossy(&body).chars().take(200).collect::<String>();
            error!(endpoint, status = %status, body_preview = %preview, "Bus API error");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: preview,
            });
        }

        Ok(body.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("upstream response malformed: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BusApiClient {
        BusApiClient::new("http://localhost:9/api/rest/", "a+b/c==", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn url_carries_encoded_key_and_params() {
        let url = client().build_url(STATION_BY_NAME, &[("stSrch", "강남"), ("pageNo", "2")]);
        assert_eq!(
            url,
            "http://localhost:9/api/rest/stationinfo/getStationByName?serviceKey=a%2Bb%2Fc%3D%3D&stSrch=%EA%B0%95%EB%82%A8&pageNo=2"
        );
    }

    #[test]
    fn empty_search_parameter_is_kept() {
        let url = client().build_url(STATION_BY_NAME, &[("stSrch", ""), ("numOfRows", "1000")]);
        assert!(url.ends_with("&stSrch=&numOfRows=1000"));
    }

    #[test]
    fn header_fields_are_extracted() {
        let root = xml::decode(
            "<ServiceResult><msgHeader><headerCd>4</headerCd><headerMsg>결과가 없습니다.</headerMsg><itemCount>0</itemCount></msgHeader></ServiceResult>"
                .as_bytes(),
        )
        .unwrap();
        let header = ResponseHeader::from_root(&root).unwrap();
        assert_eq!(header.code, "4");
        assert_eq!(header.item_count, "0");
        assert!(ResponseHeader::from_root(&Node::Missing).is_none());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let err = client().arrivals("12345").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
        assert!(!err.to_string().contains("a+b"));
    }
}
