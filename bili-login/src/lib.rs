//! QR-code login service for Bilibili.
//!
//! Serves a small page that shows a login QR code, polls Bilibili for the
//! scan result and persists the resulting cookie set as JSON.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod login;

pub use error::{Error, Result};
