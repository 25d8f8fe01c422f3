//! QR login routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use bilibili_api::ApiError as UpstreamError;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::error::Error;
use crate::login::ScanOutcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate_qrcode", get(generate_qrcode))
        .route("/qrcode_image", get(qrcode_image))
        .route("/check_scan", get(check_scan))
}

#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    pub qrcode_key: Option<String>,
}

impl KeyQuery {
    fn key(&self) -> Option<&str> {
        self.qrcode_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub qrcode_key: String,
}

async fn generate_qrcode(State(state): State<AppState>) -> ApiResult<Json<GenerateResponse>> {
    let ticket = state.login.begin_login().await?;
    Ok(Json(GenerateResponse {
        qrcode_key: ticket.qrcode_key,
    }))
}

async fn qrcode_image(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> ApiResult<impl IntoResponse> {
    let key = query
        .key()
        .ok_or_else(|| ApiError::bad_request("qrcode_key is required"))?;

    let png = state.login.qr_image(key).map_err(|e| match e {
        Error::SessionNotFound(_) => ApiError::from(e).with_status(StatusCode::BAD_REQUEST),
        other => other.into(),
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

async fn check_scan(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> ApiResult<Json<ScanOutcome>> {
    let key = query
        .key()
        .ok_or_else(|| ApiError::bad_request("qrcode_key is required"))?;

    let outcome = state.login.check_scan(key).await.map_err(|e| match e {
        // Only network trouble and unknown keys get their own codes here.
        Error::Api(UpstreamError::Upstream { .. }) => {
            tracing::error!(qrcode_key = %key, error = %e, "Scan check rejected upstream");
            ApiError::internal(format!("Internal error: {}", e))
        }
        other => other.into(),
    })?;

    Ok(Json(outcome))
}
