//! Login session state and the in-memory session table.

use std::fmt;

use bilibili_api::Credentials;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::ScanOutcome;
use crate::{Error, Result};

/// State of one QR login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    Pending,
    Scanned,
    Success,
    Expired,
}

impl LoginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scanned => "scanned",
            Self::Success => "success",
            Self::Expired => "expired",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Expired)
    }

    /// Transitions only move forward; terminal states have no successors.
    pub fn can_transition_to(&self, next: LoginStatus) -> bool {
        use LoginStatus::*;
        matches!(
            (self, next),
            (Pending, Scanned | Success | Expired) | (Scanned, Success | Expired)
        )
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight QR login attempt.
#[derive(Debug, Clone)]
pub struct LoginSession {
    key: String,
    qr_payload: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: LoginStatus,
    credentials: Option<Credentials>,
    /// Response recorded when the session reached `Success`.
    cached_outcome: Option<ScanOutcome>,
}

impl LoginSession {
    /// Fails when `created_at + ttl` does not fit in a timestamp.
    pub fn new(
        key: impl Into<String>,
        qr_payload: impl Into<String>,
        created_at: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Result<Self> {
        let expires_at = created_at.checked_add_signed(ttl).ok_or_else(|| {
            Error::Other(format!("QR lifetime of {}s is out of range", ttl.num_seconds()))
        })?;
        Ok(Self {
            key: key.into(),
            qr_payload: qr_payload.into(),
            created_at,
            expires_at,
            status: LoginStatus::Pending,
            credentials: None,
            cached_outcome: None,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn qr_payload(&self) -> &str {
        &self.qr_payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn status(&self) -> LoginStatus {
        self.status
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn cached_outcome(&self) -> Option<&ScanOutcome> {
        self.cached_outcome.as_ref()
    }

    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.status == LoginStatus::Success && self.credentials.is_some()
    }

    /// Move to `next`. Staying in the current state is a no-op.
    pub fn advance(&mut self, next: LoginStatus) -> Result<()> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record a successful login together with the response to replay.
    pub fn complete(&mut self, credentials: Credentials, outcome: ScanOutcome) -> Result<()> {
        if self.status == LoginStatus::Success {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: LoginStatus::Success.to_string(),
            });
        }
        self.advance(LoginStatus::Success)?;
        self.credentials = Some(credentials);
        self.cached_outcome = Some(outcome);
        Ok(())
    }
}

/// Process-wide table of login sessions keyed by `qrcode_key`.
///
/// Entries are cloned out so no shard lock is held across an await point;
/// concurrent writers to the same key are last-write-wins.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<String, LoginSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: LoginSession) {
        self.sessions.insert(session.key.clone(), session);
    }

    pub fn get(&self, key: &str) -> Option<LoginSession> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<LoginSession> {
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Remove `key` only while `predicate` holds for its session.
    pub fn remove_if(
        &self,
        key: &str,
        predicate: impl FnOnce(&LoginSession) -> bool,
    ) -> Option<LoginSession> {
        self.sessions
            .remove_if(key, |_, session| predicate(session))
            .map(|(_, session)| session)
    }

    /// Apply `f` to the session under `key`, if it still exists.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut LoginSession) -> R) -> Option<R> {
        self.sessions.get_mut(key).map(|mut entry| f(entry.value_mut()))
    }

    /// Keys of sessions that are past their expiry and never succeeded.
    pub fn expired_keys(&self, now: DateTime<Utc>) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| {
                entry.status != LoginStatus::Success && entry.is_expired_at(now)
            })
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Key of any session that finished with credentials.
    pub fn first_complete(&self) -> Option<String> {
        self.sessions
            .iter()
            .find(|entry| entry.is_complete())
            .map(|entry| entry.key().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
