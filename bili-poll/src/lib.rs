//! Recommendation feed poller.
//!
//! Pages through the Bilibili homepage feed with a saved login and keeps the
//! videos whose tags mention any of a set of keywords.

pub mod dump;
pub mod error;
pub mod keywords;
pub mod poller;

pub use dump::PageDump;
pub use error::{Error, Result};
pub use keywords::{DEFAULT_KEYWORDS, TagKeywords};
pub use poller::{RecommendationPoller, format_match};
