//! Bounded polling of the recommendation feed.

use std::sync::Arc;
use std::time::Duration;

use bilibili_api::{Credentials, FeedApi, FeedItem};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dump::PageDump;
use crate::keywords::TagKeywords;

/// Line written for a matched video.
pub fn format_match(item: &FeedItem) -> String {
    format!("{} {}", item.title, item.video_url())
}

pub struct RecommendationPoller {
    api: Arc<dyn FeedApi>,
    credentials: Credentials,
    keywords: TagKeywords,
    interval: Duration,
    dump: Option<PageDump>,
}

impl RecommendationPoller {
    pub fn new(api: Arc<dyn FeedApi>, credentials: Credentials, keywords: TagKeywords) -> Self {
        Self {
            api,
            credentials,
            keywords,
            interval: Duration::ZERO,
            dump: None,
        }
    }

    /// Pause between feed pages.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Save every fetched page through `dump`.
    pub fn with_dump(mut self, dump: PageDump) -> Self {
        self.dump = Some(dump);
        self
    }

    pub fn keywords(&self) -> &TagKeywords {
        &self.keywords
    }

    /// Fetch up to `max_polls` feed pages and collect matching videos,
    /// stopping as soon as `max_results` have been found. Cancellation
    /// returns whatever has been collected so far.
    pub async fn poll(
        &self,
        max_results: usize,
        max_polls: u32,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut results = Vec::new();
        if max_results == 0 {
            return results;
        }

        for page in 1..=max_polls {
            if page > 1 && !self.interval.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }

            let items = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = self.api.fetch_feed(&self.credentials, page) => res,
            };
            let items = match items {
                Ok(items) => items,
                Err(e) => {
                    warn!(page, error = %e, "Failed to fetch recommendation feed");
                    continue;
                }
            };
            debug!(page, items = items.len(), "Fetched recommendation page");

            if let Some(dump) = &self.dump
                && let Err(e) = dump.write_page(page, &items).await
            {
                warn!(page, error = %e, "Failed to save feed page");
            }

            for item in &items {
                let tags = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(found = results.len(), "Polling interrupted");
                        return results;
                    }
                    res = self.api.fetch_tags(&self.credentials, &item.bvid) => res,
                };
                let tags = tags.unwrap_or_else(|e| {
                    warn!(bvid = %item.bvid, error = %e, "Failed to fetch tags");
                    Vec::new()
                });

                if self.keywords.matches(&tags) {
                    let line = format_match(item);
                    info!(bvid = %item.bvid, title = %item.title, "Matched video");
                    results.push(line);
                    if results.len() >= max_results {
                        return results;
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            info!(found = results.len(), "Polling interrupted");
        }
        results
    }
}
