//! Bilibili credential set and cookie helpers.
//!
//! A successful QR login hands back a redirect URL whose query string
//! carries the session cookies. [`Credentials::from_redirect_url`] pulls
//! those out, and [`Credentials::cookie_header`] turns the set back into a
//! `Cookie` header for authenticated calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

pub const SESSDATA: &str = "SESSDATA";
pub const BILI_JCT: &str = "bili_jct";
pub const DEDE_USER_ID: &str = "DedeUserID";
pub const DEDE_USER_ID_CKMD5: &str = "DedeUserID__ckMd5";

/// Name used for storing refresh_token next to the cookies.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Cookies carried in the login redirect URL, in header order.
pub const PRIORITY_COOKIES: [&str; 4] = [SESSDATA, BILI_JCT, DEDE_USER_ID, DEDE_USER_ID_CKMD5];

/// Flat name → value credential map, persisted as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the session cookies from a login redirect URL.
    ///
    /// Each cookie is read from the first value of its query parameter.
    /// Missing parameters are skipped, so the result may be partial.
    ///
    /// # Example
    /// ```
    /// use bilibili_api::credentials::Credentials;
    ///
    /// let url = "https://passport.biligame.com/crossDomain?DedeUserID=42&SESSDATA=abc&bili_jct=xyz";
    /// let creds = Credentials::from_redirect_url(url, Some("tok"));
    /// assert_eq!(creds.get("SESSDATA"), Some("abc"));
    /// assert_eq!(creds.refresh_token(), Some("tok"));
    /// ```
    pub fn from_redirect_url(redirect_url: &str, refresh_token: Option<&str>) -> Self {
        let mut creds = Self::new();

        match Url::parse(redirect_url) {
            Ok(url) => {
                for name in PRIORITY_COOKIES {
                    if let Some((_, value)) = url.query_pairs().find(|(k, _)| k == name) {
                        creds.insert(name, value.into_owned());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login redirect URL is not parseable");
            }
        }

        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            creds.insert(REFRESH_TOKEN_KEY, token);
        }

        creds
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.get(REFRESH_TOKEN_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check whether the session cookie is present.
    pub fn has_session(&self) -> bool {
        self.get(SESSDATA).is_some_and(|v| !v.is_empty())
    }

    /// Render a `Cookie` header value.
    ///
    /// Priority cookies (SESSDATA, bili_jct, DedeUserID, DedeUserID__ckMd5)
    /// come first; the refresh token is never sent as a cookie.
    pub fn cookie_header(&self) -> String {
        let mut parts = Vec::with_capacity(self.0.len());

        for key in PRIORITY_COOKIES {
            if let Some(value) = self.get(key) {
                parts.push(format!("{}={}", key, value));
            }
        }

        for (key, value) in self.iter() {
            if PRIORITY_COOKIES.contains(&key) || key == REFRESH_TOKEN_KEY {
                continue;
            }
            parts.push(format!("{}={}", key, value));
        }

        parts.join("; ")
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIRECT: &str = "https://passport.biligame.com/x/passport-login/web/crossDomain?DedeUserID=1234&DedeUserID__ckMd5=c0ffee&Expires=15551000&SESSDATA=sess%2C1700000000%2Cab12&bili_jct=csrf123&gourl=https%3A%2F%2Fwww.bilibili.com";

    #[test]
    fn test_extract_full_set() {
        let creds = Credentials::from_redirect_url(REDIRECT, Some("refresh-abc"));

        assert_eq!(creds.get(SESSDATA), Some("sess,1700000000,ab12"));
        assert_eq!(creds.get(BILI_JCT), Some("csrf123"));
        assert_eq!(creds.get(DEDE_USER_ID), Some("1234"));
        assert_eq!(creds.get(DEDE_USER_ID_CKMD5), Some("c0ffee"));
        assert_eq!(creds.refresh_token(), Some("refresh-abc"));
        // Unrelated query parameters are not credentials.
        assert_eq!(creds.get("Expires"), None);
        assert_eq!(creds.len(), 5);
    }

    #[test]
    fn test_missing_csrf_yields_partial_set() {
        let url = "https://passport.biligame.com/crossDomain?DedeUserID=1&DedeUserID__ckMd5=m&SESSDATA=s";
        let creds = Credentials::from_redirect_url(url, Some("rt"));

        assert_eq!(creds.get(BILI_JCT), None);
        assert_eq!(creds.get(SESSDATA), Some("s"));
        assert_eq!(creds.get(DEDE_USER_ID), Some("1"));
        assert_eq!(creds.get(DEDE_USER_ID_CKMD5), Some("m"));
        assert_eq!(creds.refresh_token(), Some("rt"));
        assert_eq!(creds.len(), 4);
    }

    #[test]
    fn test_first_value_wins() {
        let url = "https://example.com/?SESSDATA=first&SESSDATA=second";
        let creds = Credentials::from_redirect_url(url, None);
        assert_eq!(creds.get(SESSDATA), Some("first"));
        assert_eq!(creds.refresh_token(), None);
    }

    #[test]
    fn test_unparseable_url() {
        let creds = Credentials::from_redirect_url("not a url", Some("rt"));
        assert!(!creds.has_session());
        assert_eq!(creds.refresh_token(), Some("rt"));
    }

    #[test]
    fn test_cookie_header_order() {
        let mut creds = Credentials::new();
        creds.insert("buvid3", "b3");
        creds.insert(REFRESH_TOKEN_KEY, "secret");
        creds.insert(DEDE_USER_ID, "1");
        creds.insert(SESSDATA, "s");

        assert_eq!(creds.cookie_header(), "SESSDATA=s; DedeUserID=1; buvid3=b3");
    }

    #[test]
    fn test_json_shape_is_flat() {
        let creds = Credentials::from_redirect_url(REDIRECT, Some("rt"));
        let value = serde_json::to_value(&creds).unwrap();
        assert_eq!(value["bili_jct"], "csrf123");
        assert_eq!(value["refresh_token"], "rt");

        let back: Credentials = serde_json::from_value(value).unwrap();
        assert_eq!(back, creds);
    }
}
