//! QR login orchestration.
//!
//! [`LoginService`] owns the session table and drives each session through
//! its states by polling the passport API. A successful scan derives the
//! credential set from the redirect URL, persists it, and announces it on
//! the event channel.

use std::sync::Arc;
use std::time::Duration;

use bilibili_api::qr_login::QrPollStatus;
use bilibili_api::{Credentials, PassportApi, QrPollData};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::qr_image;
use super::session::{LoginSession, LoginStatus, SessionTable};
use crate::credentials::CredentialStore;
use crate::{Error, Result};

/// Lifetime of a QR code when the generate endpoint does not say.
pub const DEFAULT_QR_TTL: Duration = Duration::from_secs(60);

/// Code reported when a session ran out of time before upstream said so.
pub const LOCAL_EXPIRED_CODE: i64 = -1;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Body returned for a scan-status check: `{code, message, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ScanOutcome {
    /// Local expiry, decided without contacting upstream.
    pub fn expired() -> Self {
        Self {
            code: LOCAL_EXPIRED_CODE,
            message: "QR code expired".to_string(),
            data: None,
        }
    }

    /// Mirror an upstream poll payload.
    pub fn from_upstream(data: &QrPollData) -> Result<Self> {
        Ok(Self {
            code: data.code,
            message: data.message.clone(),
            data: Some(serde_json::to_value(data)?),
        })
    }
}

/// A freshly issued QR code.
#[derive(Debug, Clone, Serialize)]
pub struct QrTicket {
    pub qrcode_key: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone)]
pub enum LoginEvent {
    /// A session reached `Success` and its credentials were derived.
    Completed {
        key: String,
        credentials: Credentials,
    },
    /// A session was dropped because it expired.
    Expired { key: String },
    /// A session was dropped after upstream answered with an unknown code.
    Dropped { key: String, code: i64 },
}

pub struct LoginService {
    api: Arc<dyn PassportApi>,
    store: Arc<dyn CredentialStore>,
    sessions: SessionTable,
    events: broadcast::Sender<LoginEvent>,
    default_ttl: Duration,
}

impl LoginService {
    pub fn new(api: Arc<dyn PassportApi>, store: Arc<dyn CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            store,
            sessions: SessionTable::new(),
            events,
            default_ttl: DEFAULT_QR_TTL,
        }
    }

    /// Override the lifetime used when upstream gives none.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LoginEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: LoginEvent) {
        // No receivers just means nobody is waiting.
        let _ = self.events.send(event);
    }

    fn expire(&self, key: &str) {
        if self.sessions.remove(key).is_some() {
            self.emit(LoginEvent::Expired {
                key: key.to_string(),
            });
        }
    }

    /// Request a new QR code from Bilibili and start tracking it.
    pub async fn begin_login(&self) -> Result<QrTicket> {
        self.begin_login_at(Utc::now()).await
    }

    pub(crate) async fn begin_login_at(&self, now: DateTime<Utc>) -> Result<QrTicket> {
        let generated = self.api.generate_qr().await?;

        let ttl = generated
            .expire_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|e| Error::Other(format!("QR lifetime out of range: {}", e)))?;

        let session = LoginSession::new(&generated.qrcode_key, &generated.url, now, ttl)?;
        let ticket = QrTicket {
            qrcode_key: generated.qrcode_key,
            url: generated.url,
            expires_at: session.expires_at(),
        };
        self.sessions.insert(session);

        info!(
            qrcode_key = %ticket.qrcode_key,
            expires_at = %ticket.expires_at,
            "QR code generated"
        );
        Ok(ticket)
    }

    /// Render the QR image for a live session as PNG.
    pub fn qr_image(&self, key: &str) -> Result<Vec<u8>> {
        self.qr_image_at(key, Utc::now())
    }

    pub(crate) fn qr_image_at(&self, key: &str, now: DateTime<Utc>) -> Result<Vec<u8>> {
        let session = self
            .sessions
            .get(key)
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))?;

        if session.is_expired_at(now) {
            self.expire(key);
            debug!(qrcode_key = %key, "QR image requested for expired session");
            return Err(Error::SessionExpired(key.to_string()));
        }

        qr_image::render_png(session.qr_payload())
    }

    /// Report the scan state of a session, polling upstream when needed.
    pub async fn check_scan(&self, key: &str) -> Result<ScanOutcome> {
        self.check_scan_at(key, Utc::now()).await
    }

    pub(crate) async fn check_scan_at(&self, key: &str, now: DateTime<Utc>) -> Result<ScanOutcome> {
        let session = self
            .sessions
            .get(key)
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))?;

        // A recorded success is final; expiry no longer applies.
        if session.status() == LoginStatus::Success
            && let Some(outcome) = session.cached_outcome()
        {
            return Ok(outcome.clone());
        }

        if session.is_expired_at(now) {
            self.expire(key);
            info!(qrcode_key = %key, "QR code expired during poll");
            return Ok(ScanOutcome::expired());
        }

        let data = self.api.poll_qr(key).await?;

        match data.status() {
            QrPollStatus::Success => self.record_success(key, &data).await,
            QrPollStatus::ScannedNotConfirmed => {
                self.transition(key, LoginStatus::Scanned);
                debug!(qrcode_key = %key, "QR code scanned, waiting for confirmation");
                ScanOutcome::from_upstream(&data)
            }
            QrPollStatus::NotScanned => {
                debug!(qrcode_key = %key, "QR code not scanned yet");
                ScanOutcome::from_upstream(&data)
            }
            QrPollStatus::Expired => {
                self.transition(key, LoginStatus::Expired);
                self.expire(key);
                info!(qrcode_key = %key, "QR code invalidated upstream");
                ScanOutcome::from_upstream(&data)
            }
            QrPollStatus::Unknown(code) => {
                warn!(
                    qrcode_key = %key,
                    code,
                    message = %data.message,
                    "Unexpected QR poll status; dropping session"
                );
                if self.sessions.remove(key).is_some() {
                    self.emit(LoginEvent::Dropped {
                        key: key.to_string(),
                        code,
                    });
                }
                ScanOutcome::from_upstream(&data)
            }
        }
    }

    fn transition(&self, key: &str, next: LoginStatus) {
        match self.sessions.update(key, |s| s.advance(next)) {
            Some(Ok(())) | None => {}
            Some(Err(e)) => debug!(qrcode_key = %key, error = %e, "Ignoring status change"),
        }
    }

    async fn record_success(&self, key: &str, data: &QrPollData) -> Result<ScanOutcome> {
        if data.url.is_empty() {
            warn!(qrcode_key = %key, "Login succeeded but no redirect URL was returned");
        }
        let credentials = Credentials::from_redirect_url(&data.url, Some(&data.refresh_token));

        let mut payload = serde_json::to_value(data)?;
        if let Value::Object(map) = &mut payload {
            map.insert(
                "extracted_cookies".to_string(),
                serde_json::to_value(&credentials)?,
            );
        }
        let outcome = ScanOutcome {
            code: data.code,
            message: data.message.clone(),
            data: Some(payload),
        };

        match self
            .sessions
            .update(key, |s| s.complete(credentials.clone(), outcome.clone()))
        {
            Some(Ok(())) => {
                info!(qrcode_key = %key, fields = credentials.len(), "User logged in");
            }
            Some(Err(e)) => {
                // Another request recorded the success first.
                debug!(qrcode_key = %key, error = %e, "Success already recorded");
                if let Some(cached) = self
                    .sessions
                    .get(key)
                    .and_then(|s| s.cached_outcome().cloned())
                {
                    return Ok(cached);
                }
            }
            None => warn!(qrcode_key = %key, "Session vanished before success was recorded"),
        }

        if let Err(e) = self.store.save(&credentials).await {
            error!(qrcode_key = %key, error = %e, "Failed to persist credentials");
        }

        self.emit(LoginEvent::Completed {
            key: key.to_string(),
            credentials,
        });

        Ok(outcome)
    }

    /// Take the credentials of a completed session, removing it.
    pub fn consume(&self, key: &str) -> Option<Credentials> {
        self.sessions
            .remove_if(key, |s| s.is_complete())
            .and_then(|s| s.credentials().cloned())
    }

    /// Take the first completed session found in the table.
    pub fn consume_any(&self) -> Option<(String, Credentials)> {
        let key = self.sessions.first_complete()?;
        let credentials = self.consume(&key)?;
        Some((key, credentials))
    }

    /// Drop every expired session that never succeeded.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub(crate) fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for key in self.sessions.expired_keys(now) {
            if self
                .sessions
                .remove_if(&key, |s| {
                    s.status() != LoginStatus::Success && s.is_expired_at(now)
                })
                .is_some()
            {
                self.emit(LoginEvent::Expired { key });
                removed += 1;
            }
        }
        removed
    }

    /// Periodically purge expired sessions until `cancel_token` fires.
    pub fn spawn_expiry_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Login session sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let removed = service.purge_expired();
                        if removed > 0 {
                            debug!(removed, "Purged expired login sessions");
                        }
                    }
                }
            }
        })
    }
}
