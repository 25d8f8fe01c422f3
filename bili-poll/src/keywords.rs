//! Tag keyword matching.

use bilibili_api::Tag;

use crate::error::{Error, Result};

/// Keywords for MyGO!!!!!, Ave Mujica, Girls Band Cry and their members.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "mygo",
    "ave",
    "mujica",
    "gbc",
    "girls band cry",
    "bang",
    "dream",
    "少女乐团派对",
    "千早",
    "爱音",
    "anon",
    "长崎",
    "素世",
    "爽世",
    "soyo",
    "高松",
    "灯",
    "要",
    "乐奈",
    "椎名",
    "立希",
    "丰川",
    "祥子",
    "saki",
    "三角",
    "初华",
    "若叶",
    "睦",
    "八幡",
    "海铃",
    "祐天寺",
    "若麦",
    "喵梦",
];

/// A lower-cased set of keywords matched as substrings of tag names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagKeywords {
    keywords: Vec<String>,
}

impl Default for TagKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

impl TagKeywords {
    /// Normalise and deduplicate `keywords`; blank entries are dropped.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for kw in keywords {
            let kw = kw.as_ref().trim().to_lowercase();
            if !kw.is_empty() && !out.contains(&kw) {
                out.push(kw);
            }
        }
        Self { keywords: out }
    }

    /// Parse a comma-separated list such as `"mygo, Ave Mujica"`.
    pub fn parse(list: &str) -> Result<Self> {
        let keywords = Self::new(list.split(','));
        if keywords.is_empty() {
            return Err(Error::NoKeywords);
        }
        Ok(keywords)
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    /// Whether any keyword occurs in `name`, ignoring case.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.keywords.iter().any(|kw| name.contains(kw.as_str()))
    }

    /// Whether any tag name contains any keyword, ignoring case.
    pub fn matches(&self, tags: &[Tag]) -> bool {
        tags.iter().any(|tag| self.matches_name(&tag.tag_name))
    }
}
