//! Optional archive of every fetched feed page.

use std::path::{Path, PathBuf};

use bilibili_api::FeedItem;
use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::{Error, Result};

pub const DUMP_FILE_PREFIX: &str = "bilibili_recommendations";

/// Writes each fetched page as pretty JSON into one directory.
#[derive(Debug, Clone)]
pub struct PageDump {
    dir: PathBuf,
}

impl PageDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/bilibili_recommendations_<YYYYmmdd_HHMMSS>_<page>.json`
    pub fn file_path(&self, at: DateTime<Local>, page: u32) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}.json",
            DUMP_FILE_PREFIX,
            at.format("%Y%m%d_%H%M%S"),
            page
        ))
    }

    pub async fn write_page(&self, page: u32, items: &[FeedItem]) -> Result<PathBuf> {
        self.write_page_at(Local::now(), page, items).await
    }

    pub(crate) async fn write_page_at(
        &self,
        at: DateTime<Local>,
        page: u32,
        items: &[FeedItem],
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| Error::WriteOutput {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.file_path(at, page);
        let json = serde_json::to_vec_pretty(items)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| Error::WriteOutput {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), items = items.len(), "Saved feed page");
        Ok(path)
    }
}
