//! Homepage recommendation feed and per-video tags.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::client::{ApiResponse, BiliClient};
use crate::credentials::Credentials;
use crate::error::ApiError;

pub const RECOMMEND_PATH: &str = "/x/web-interface/index/top/feed/rcmd";
pub const TAG_PATH: &str = "/x/web-interface/view/detail/tag";

pub const VIDEO_URL_PREFIX: &str = "https://www.bilibili.com/video/";

/// Items requested per feed page.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(default)]
    pub bvid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub goto: String,
    #[serde(default)]
    pub uri: String,
}

impl FeedItem {
    /// Canonical watch page of the video.
    pub fn video_url(&self) -> String {
        format!("{}{}", VIDEO_URL_PREFIX, self.bvid)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FeedPage {
    #[serde(default)]
    item: Vec<FeedItem>,
}

impl FeedPage {
    /// Keep only playable videos; ads and live cards have no bvid.
    fn into_videos(self) -> Vec<FeedItem> {
        self.item
            .into_iter()
            .filter(|item| !item.bvid.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub tag_id: u64,
    pub tag_name: String,
}

impl Tag {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_id: 0,
            tag_name: tag_name.into(),
        }
    }
}

/// Recommendation endpoints used by the poller.
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Fetch one page of recommended videos. `fresh_idx` counts the pages
    /// already requested in this run so the feed rotates.
    async fn fetch_feed(
        &self,
        credentials: &Credentials,
        fresh_idx: u32,
    ) -> Result<Vec<FeedItem>, ApiError>;

    /// Fetch the tag list of one video.
    async fn fetch_tags(&self, credentials: &Credentials, bvid: &str)
    -> Result<Vec<Tag>, ApiError>;
}

fn cookie_headers(credentials: &Credentials) -> Option<HeaderMap> {
    if credentials.is_empty() {
        return None;
    }
    let value = HeaderValue::from_str(&credentials.cookie_header()).ok()?;
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, value);
    Some(headers)
}

#[async_trait]
impl FeedApi for BiliClient {
    async fn fetch_feed(
        &self,
        credentials: &Credentials,
        fresh_idx: u32,
    ) -> Result<Vec<FeedItem>, ApiError> {
        let url = self.api_url(RECOMMEND_PATH);
        let ps = DEFAULT_PAGE_SIZE.to_string();
        let idx = fresh_idx.to_string();
        let params = [
            ("ps", ps.as_str()),
            ("fresh_idx", idx.as_str()),
            ("fresh_idx_1h", idx.as_str()),
            ("fresh_type", "4"),
        ];

        let body: ApiResponse<FeedPage> = self
            .request_json(Method::GET, &url, &params, cookie_headers(credentials))
            .await?;
        let items = body.into_data()?.into_videos();
        tracing::debug!(fresh_idx, count = items.len(), "Fetched recommendation page");
        Ok(items)
    }

    async fn fetch_tags(
        &self,
        credentials: &Credentials,
        bvid: &str,
    ) -> Result<Vec<Tag>, ApiError> {
        let url = self.api_url(TAG_PATH);
        let body: ApiResponse<Vec<Tag>> = self
            .request_json(
                Method::GET,
                &url,
                &[("bvid", bvid)],
                cookie_headers(credentials),
            )
            .await?;

        if body.code != 0 {
            return Err(ApiError::Upstream {
                code: body.code,
                message: body.message,
            });
        }
        // `data` is null for videos without tags.
        Ok(body.data.unwrap_or_default())
    }
}
