//! Shared HTTP client for the Bilibili endpoints.
//!
//! Every outbound call goes through [`BiliClient`], which merges a fixed
//! browser-like header set with per-call overrides and translates failures
//! into [`ApiError`] so callers can match on the failure kind.

use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT,
};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::ApiError;

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://www.bilibili.com/";
pub const DEFAULT_ORIGIN: &str = "https://www.bilibili.com";

pub const DEFAULT_PASSPORT_BASE: &str = "https://passport.bilibili.com";
pub const DEFAULT_API_BASE: &str = "https://api.bilibili.com";

/// Connection settings for [`BiliClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the passport (login) host
    pub passport_base: String,
    /// Base URL of the web-interface API host
    pub api_base: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            passport_base: DEFAULT_PASSPORT_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_UA.to_string(),
        }
    }
}

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// The header set every request starts from.
pub fn default_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, ua);
    }
    headers.insert(REFERER, HeaderValue::from_static(DEFAULT_REFERER));
    headers.insert(ORIGIN, HeaderValue::from_static(DEFAULT_ORIGIN));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
    headers
}

/// Standard `{code, message, data}` envelope used by Bilibili.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload, turning a non-zero application code into
    /// [`ApiError::Upstream`].
    pub fn into_data(self) -> Result<T, ApiError> {
        if self.code != 0 {
            return Err(ApiError::Upstream {
                code: self.code,
                message: self.message,
            });
        }
        self.data
            .ok_or_else(|| ApiError::decode("response has no data field"))
    }
}

#[derive(Debug, Clone)]
pub struct BiliClient {
    client: Client,
    headers: HeaderMap,
    config: ClientConfig,
}

impl BiliClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        install_rustls_provider();

        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Wrap an already configured `reqwest::Client`.
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        let headers = default_headers(&config.user_agent);
        Self {
            client,
            headers,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn passport_url(&self, path: &str) -> String {
        format!("{}{}", self.config.passport_base.trim_end_matches('/'), path)
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Default headers with `overrides` applied on top; an override replaces
    /// the default value of the same name.
    pub fn merged_headers(&self, overrides: Option<HeaderMap>) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(overrides) = overrides {
            for (name, value) in overrides.iter() {
                headers.insert(name.clone(), value.clone());
            }
        }
        headers
    }

    /// Send a request and return the raw body of a 2xx response.
    pub async fn request_bytes(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        headers: Option<HeaderMap>,
    ) -> Result<Bytes, ApiError> {
        let response = self
            .client
            .request(method, url)
            .query(params)
            .headers(self.merged_headers(headers))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), url = %response.url(), "Non-success response");
            return Err(ApiError::Protocol {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.bytes().await?;
        trace!(url = %url, len = body.len(), "Response received");
        Ok(body)
    }

    /// Send a request and decode the 2xx body as JSON.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        headers: Option<HeaderMap>,
    ) -> Result<T, ApiError> {
        let body = self.request_bytes(method, url, params, headers).await?;
        serde_json::from_slice(&body).map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::{Value, json};

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route(
                "/echo",
                get(|headers: axum::http::HeaderMap| async move {
                    let header = |name: &str| {
                        headers
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string()
                    };
                    Json(json!({
                        "code": 0,
                        "message": "0",
                        "data": {
                            "user_agent": header("user-agent"),
                            "referer": header("referer"),
                            "origin": header("origin"),
                        }
                    }))
                }),
            )
            .route("/fail", get(|| async { StatusCode::BAD_GATEWAY }))
            .route("/garbage", get(|| async { "<html>not json</html>" }))
            .route(
                "/denied",
                get(|| async { Json(json!({"code": -101, "message": "not logged in"})) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base: &str) -> BiliClient {
        BiliClient::new(ClientConfig {
            passport_base: base.to_string(),
            api_base: base.to_string(),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_merged_headers_override_wins() {
        let client = BiliClient::with_client(Client::new(), ClientConfig::default());
        let mut overrides = HeaderMap::new();
        overrides.insert(REFERER, HeaderValue::from_static("https://live.bilibili.com"));

        let merged = client.merged_headers(Some(overrides));
        assert_eq!(merged.get(REFERER).unwrap(), "https://live.bilibili.com");
        assert_eq!(merged.get(ORIGIN).unwrap(), DEFAULT_ORIGIN);
        assert_eq!(merged.get(USER_AGENT).unwrap(), DEFAULT_UA);
    }

    #[test]
    fn test_url_joining() {
        let client = BiliClient::with_client(
            Client::new(),
            ClientConfig {
                passport_base: "http://127.0.0.1:9000/".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(
            client.passport_url("/x/passport-login/web/qrcode/generate"),
            "http://127.0.0.1:9000/x/passport-login/web/qrcode/generate"
        );
        assert_eq!(
            client.api_url("/x/web-interface/index/top/feed/rcmd"),
            "https://api.bilibili.com/x/web-interface/index/top/feed/rcmd"
        );
    }

    #[tokio::test]
    async fn test_request_json_sends_default_headers() {
        let base = spawn_stub().await;
        let client = client_for(&base);

        let response: ApiResponse<Value> = client
            .request_json(Method::GET, &format!("{base}/echo"), &[], None)
            .await
            .unwrap();
        let data = response.into_data().unwrap();
        assert_eq!(data["user_agent"], DEFAULT_UA);
        assert_eq!(data["referer"], DEFAULT_REFERER);
        assert_eq!(data["origin"], DEFAULT_ORIGIN);
    }

    #[tokio::test]
    async fn test_error_kinds() {
        let base = spawn_stub().await;
        let client = client_for(&base);

        let err = client
            .request_json::<Value>(Method::GET, &format!("{base}/fail"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Protocol { status: 502, .. }));

        let err = client
            .request_json::<Value>(Method::GET, &format!("{base}/garbage"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));

        let err = client
            .request_json::<ApiResponse<Value>>(Method::GET, &format!("{base}/denied"), &[], None)
            .await
            .unwrap()
            .into_data()
            .unwrap_err();
        assert_eq!(err.upstream_code(), Some(-101));
    }

    #[tokio::test]
    async fn test_network_error() {
        // Nothing listens on port 9 of the loopback interface.
        let client = client_for("http://127.0.0.1:9");
        let err = client
            .request_bytes(Method::GET, "http://127.0.0.1:9/", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert!(err.is_transient());
    }
}
