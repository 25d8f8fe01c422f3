//! API route modules.

pub mod health;
pub mod index;
pub mod login;

use axum::Router;

use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(index::router())
        .merge(login::router())
        .merge(health::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::login::LoginService;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use bilibili_api::{ApiError, BiliClient, ClientConfig, PassportApi, QrGenerateData, QrPollData};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Passport stub whose poll answer is chosen by the key.
    struct StubPassport;

    #[async_trait]
    impl PassportApi for StubPassport {
        async fn generate_qr(&self) -> Result<QrGenerateData, ApiError> {
            Ok(QrGenerateData {
                url: "https://x/qr?oauthKey=abc".to_string(),
                qrcode_key: "abc".to_string(),
                expire_seconds: Some(180),
            })
        }

        async fn poll_qr(&self, _qrcode_key: &str) -> Result<QrPollData, ApiError> {
            Ok(QrPollData {
                code: 86101,
                message: "未扫码".to_string(),
                url: String::new(),
                refresh_token: String::new(),
                timestamp: 0,
                extra: Default::default(),
            })
        }
    }

    /// Passport stub that always fails to generate.
    struct BannedPassport;

    #[async_trait]
    impl PassportApi for BannedPassport {
        async fn generate_qr(&self) -> Result<QrGenerateData, ApiError> {
            Err(ApiError::Upstream {
                code: -412,
                message: "request was banned".to_string(),
            })
        }

        async fn poll_qr(&self, _qrcode_key: &str) -> Result<QrPollData, ApiError> {
            Err(ApiError::Upstream {
                code: -412,
                message: "request was banned".to_string(),
            })
        }
    }

    #[derive(Clone, Copy)]
    enum Failure {
        Network,
        HttpStatus,
    }

    /// Passport stub that fails with the chosen transport-level error.
    /// Generation can be allowed so that a session exists to poll.
    struct FailingPassport {
        failure: Failure,
        allow_generate: bool,
        unreachable: BiliClient,
    }

    impl FailingPassport {
        fn new(failure: Failure, allow_generate: bool) -> Self {
            let config = ClientConfig {
                passport_base: "http://127.0.0.1:9".to_string(),
                timeout: std::time::Duration::from_secs(5),
                ..ClientConfig::default()
            };
            Self {
                failure,
                allow_generate,
                unreachable: BiliClient::new(config).unwrap(),
            }
        }

        fn http_status_error() -> ApiError {
            ApiError::Protocol {
                status: 502,
                url: "https://passport.bilibili.com".to_string(),
            }
        }
    }

    #[async_trait]
    impl PassportApi for FailingPassport {
        async fn generate_qr(&self) -> Result<QrGenerateData, ApiError> {
            if self.allow_generate {
                return StubPassport.generate_qr().await;
            }
            match self.failure {
                Failure::Network => self.unreachable.generate_qr().await,
                Failure::HttpStatus => Err(Self::http_status_error()),
            }
        }

        async fn poll_qr(&self, qrcode_key: &str) -> Result<QrPollData, ApiError> {
            match self.failure {
                Failure::Network => self.unreachable.poll_qr(qrcode_key).await,
                Failure::HttpStatus => Err(Self::http_status_error()),
            }
        }
    }

    fn app(api: Arc<dyn PassportApi>) -> (Router, Arc<LoginService>) {
        let login = Arc::new(LoginService::new(
            api,
            Arc::new(MemoryCredentialStore::new()),
        ));
        (create_router(AppState::new(login.clone())), login)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    fn json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_index_page() {
        let (app, _) = app(Arc::new(StubPassport));
        let (status, headers, body) = get(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        assert!(String::from_utf8(body).unwrap().contains("generate_qrcode"));
    }

    #[tokio::test]
    async fn test_generate_then_image_then_check() {
        let (app, login) = app(Arc::new(StubPassport));

        let (status, _, body) = get(&app, "/generate_qrcode").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["qrcode_key"], "abc");
        assert_eq!(login.sessions().len(), 1);

        let (status, headers, body) = get(&app, "/qrcode_image?qrcode_key=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(&body[1..4], b"PNG");

        let (status, _, body) = get(&app, "/check_scan?qrcode_key=abc").await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["code"], 86101);
        assert_eq!(body["data"]["code"], 86101);

        let (_, _, body) = get(&app, "/health").await;
        let body = json(&body);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 1);
    }

    #[tokio::test]
    async fn test_generate_upstream_failure() {
        let (app, _) = app(Arc::new(BannedPassport));
        let (status, _, body) = get(&app, "/generate_qrcode").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(&body);
        assert_eq!(body["code"], -412);
        assert_eq!(body["message"], "request was banned");
    }

    #[tokio::test]
    async fn test_missing_and_unknown_keys() {
        let (app, _) = app(Arc::new(StubPassport));

        let (status, _, body) = get(&app, "/check_scan").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["code"], -100);

        let (status, _, body) = get(&app, "/check_scan?qrcode_key=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["code"], -100);

        let (status, _, body) = get(&app, "/check_scan?qrcode_key=nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["code"], -1);

        let (status, _, _) = get(&app, "/qrcode_image").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get(&app, "/qrcode_image?qrcode_key=nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_transport_failures_are_unavailable() {
        for failure in [Failure::Network, Failure::HttpStatus] {
            let (app, login) = app(Arc::new(FailingPassport::new(failure, false)));
            let (status, _, body) = get(&app, "/generate_qrcode").await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(json(&body)["code"], -101);
            assert!(login.sessions().is_empty());
        }
    }

    #[tokio::test]
    async fn test_check_scan_transport_failures_are_unavailable() {
        for failure in [Failure::Network, Failure::HttpStatus] {
            let (app, login) = app(Arc::new(FailingPassport::new(failure, true)));
            let (status, _, _) = get(&app, "/generate_qrcode").await;
            assert_eq!(status, StatusCode::OK);

            let (status, _, body) = get(&app, "/check_scan?qrcode_key=abc").await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            let body = json(&body);
            assert_eq!(body["code"], -101);
            assert!(body["message"].as_str().unwrap().starts_with("Network error"));
            assert!(login.sessions().contains("abc"));
        }
    }

    #[tokio::test]
    async fn test_generate_with_unrepresentable_lifetime() {
        struct FarFuture;

        #[async_trait]
        impl PassportApi for FarFuture {
            async fn generate_qr(&self) -> Result<QrGenerateData, ApiError> {
                Ok(QrGenerateData {
                    url: "https://x/qr?oauthKey=abc".to_string(),
                    qrcode_key: "abc".to_string(),
                    expire_seconds: Some(10_000_000_000_000),
                })
            }

            async fn poll_qr(&self, qrcode_key: &str) -> Result<QrPollData, ApiError> {
                StubPassport.poll_qr(qrcode_key).await
            }
        }

        let (app, _) = app(Arc::new(FarFuture));
        let (status, _, body) = get(&app, "/generate_qrcode").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(&body)["code"], -102);
    }
}
