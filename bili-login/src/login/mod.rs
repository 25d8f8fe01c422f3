//! QR code login: session tracking, upstream polling and image rendering.

pub mod qr_image;
mod service;
mod session;

pub use qr_image::render_png;
pub use service::{
    DEFAULT_QR_TTL, LOCAL_EXPIRED_CODE, LoginEvent, LoginService, QrTicket, ScanOutcome,
};
pub use session::{LoginSession, LoginStatus, SessionTable};
