//! Minimal Bilibili web API client.
//!
//! Covers the pieces needed for a QR-code login and for reading the
//! homepage recommendation feed:
//!
//! - [`client::BiliClient`]: shared HTTP facade with default headers
//! - [`qr_login`]: QR generate/poll endpoints behind [`qr_login::PassportApi`]
//! - [`feed`]: recommendation and tag endpoints behind [`feed::FeedApi`]
//! - [`credentials::Credentials`]: the cookie set derived from a login
//! - [`store`]: persistence of that cookie set

pub mod client;
pub mod credentials;
pub mod error;
pub mod feed;
pub mod qr_login;
pub mod store;

pub use client::{BiliClient, ClientConfig};
pub use credentials::Credentials;
pub use error::ApiError;
pub use feed::{FeedApi, FeedItem, Tag};
pub use qr_login::{PassportApi, QrGenerateData, QrPollData, QrPollStatus};
pub use store::{CredentialStore, JsonFileCredentialStore, MemoryCredentialStore, StoreError};
