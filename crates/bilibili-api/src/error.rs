use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {status} from {url}")]
    Protocol { status: u16, url: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Transport faults and 5xx responses may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Protocol { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Application-level code reported by Bilibili, if any.
    pub fn upstream_code(&self) -> Option<i64> {
        match self {
            Self::Upstream { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
