//! Bilibili QR code login using the web passport API.
//!
//! The web endpoint hands back a `qrcode_key` plus the URL to encode. Polling
//! the key reports the scan state in `data.code`; on success `data.url` is a
//! cross-domain redirect whose query string carries the session cookies.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{ApiResponse, BiliClient};
use crate::error::ApiError;

pub const QR_GENERATE_PATH: &str = "/x/passport-login/web/qrcode/generate";
pub const QR_POLL_PATH: &str = "/x/passport-login/web/qrcode/poll";

/// Scan state codes reported in `data.code` of the poll response.
pub mod codes {
    pub const SUCCESS: i64 = 0;
    pub const EXPIRED: i64 = 86038;
    pub const SCANNED_NOT_CONFIRMED: i64 = 86090;
    pub const NOT_SCANNED: i64 = 86101;
}

/// QR code generation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrGenerateData {
    /// URL to encode as QR code
    pub url: String,
    /// Key for polling
    pub qrcode_key: String,
    /// Lifetime hint; not every deployment of the endpoint sends it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_seconds: Option<u64>,
}

/// QR code poll status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QrPollStatus {
    /// QR not yet scanned
    NotScanned,
    /// QR scanned but not confirmed
    ScannedNotConfirmed,
    /// QR code expired
    Expired,
    /// Login successful
    Success,
    /// Any code this client does not know about
    Unknown(i64),
}

impl QrPollStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            codes::SUCCESS => Self::Success,
            codes::SCANNED_NOT_CONFIRMED => Self::ScannedNotConfirmed,
            codes::NOT_SCANNED => Self::NotScanned,
            codes::EXPIRED => Self::Expired,
            other => Self::Unknown(other),
        }
    }
}

/// The `data` object of a poll response.
///
/// Unknown fields are kept in `extra` so the payload can be handed back to a
/// caller unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPollData {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    /// Cross-domain redirect carrying the cookies (success only)
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl QrPollData {
    pub fn status(&self) -> QrPollStatus {
        QrPollStatus::from_code(self.code)
    }
}

/// Passport endpoints needed for the QR handshake.
#[async_trait]
pub trait PassportApi: Send + Sync {
    /// Request a new QR code.
    ///
    /// A non-zero application code is reported as [`ApiError::Upstream`].
    async fn generate_qr(&self) -> Result<QrGenerateData, ApiError>;

    /// Poll the scan state of `qrcode_key`.
    async fn poll_qr(&self, qrcode_key: &str) -> Result<QrPollData, ApiError>;
}

#[async_trait]
impl PassportApi for BiliClient {
    async fn generate_qr(&self) -> Result<QrGenerateData, ApiError> {
        let url = self.passport_url(QR_GENERATE_PATH);
        let body: ApiResponse<QrGenerateData> =
            self.request_json(Method::GET, &url, &[], None).await?;

        let data = body.into_data()?;
        tracing::debug!(qrcode_key = %data.qrcode_key, "Bilibili QR generated");
        Ok(data)
    }

    async fn poll_qr(&self, qrcode_key: &str) -> Result<QrPollData, ApiError> {
        let url = self.passport_url(QR_POLL_PATH);
        let body: ApiResponse<QrPollData> = self
            .request_json(Method::GET, &url, &[("qrcode_key", qrcode_key)], None)
            .await?;

        let data = body.into_data()?;
        tracing::debug!(
            code = data.code,
            message = %data.message,
            "Bilibili QR poll response"
        );
        Ok(data)
    }
}
