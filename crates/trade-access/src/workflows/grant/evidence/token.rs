//! Signed magic-link tokens.
//!
//! A token is a stateless, time-limited capability: the signed payload is
//! the whole resource, nothing is persisted when one is issued. The payload
//! binds an application id to a single action so an upload token cannot be
//! replayed as a resume link.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::workflows::grant::applications::ApplicationId;

const PAYLOAD_VERSION: &str = "v1";

/// The action a magic-link authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    UploadEventEvidence,
    ResumeApplication,
}

impl ActionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UploadEventEvidence => "upload-event-evidence",
            Self::ResumeApplication => "resume-application",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "upload-event-evidence" => Some(Self::UploadEventEvidence),
            "resume-application" => Some(Self::ResumeApplication),
            _ => None,
        }
    }
}

/// Token verification failures. `Invalid` deliberately covers every
/// malformed or tampered shape so callers cannot distinguish them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("magic-link token is invalid")]
    Invalid,
    #[error("magic-link token has expired")]
    Expired,
}

/// A successfully verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub application: ApplicationId,
    pub action: ActionType,
}

/// Issues and verifies magic-link tokens with a shared symmetric secret.
#[derive(Clone)]
pub struct MagicLinkIssuer {
    secret: Vec<u8>,
    ttl_seconds: i64,
    frontend_base_url: String,
}

impl MagicLinkIssuer {
    pub fn new(secret: &str, ttl_seconds: i64, frontend_base_url: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_seconds,
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn issue(&self, application: &ApplicationId, action: ActionType) -> String {
        self.issue_at(application, action, Utc::now())
    }

    /// Issue with an explicit clock, used by expiry tests.
    pub fn issue_at(
        &self,
        application: &ApplicationId,
        action: ActionType,
        issued: DateTime<Utc>,
    ) -> String {
        let payload = format!(
            "{PAYLOAD_VERSION}:{}:{}:{}:{}",
            application,
            action.as_str(),
            issued.timestamp(),
            self.ttl_seconds,
        );
        let mac = self.mac(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(mac),
        )
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, TokenError> {
        let (payload_part, mac_part) = token.split_once('.').ok_or(TokenError::Invalid)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| TokenError::Invalid)?;
        let presented_mac = URL_SAFE_NO_PAD
            .decode(mac_part)
            .map_err(|_| TokenError::Invalid)?;

        let expected_mac = self.mac(&payload);
        if !constant_time_eq(&expected_mac, &presented_mac) {
            return Err(TokenError::Invalid);
        }

        let payload = String::from_utf8(payload).map_err(|_| TokenError::Invalid)?;
        let mut parts = payload.split(':');
        let version = parts.next().ok_or(TokenError::Invalid)?;
        if version != PAYLOAD_VERSION {
            return Err(TokenError::Invalid);
        }
        let application = parts
            .next()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(TokenError::Invalid)?;
        let action = parts
            .next()
            .and_then(ActionType::parse)
            .ok_or(TokenError::Invalid)?;
        let issued: i64 = parts
            .next()
            .and_then(|raw| raw.parse().ok())
            .ok_or(TokenError::Invalid)?;
        let ttl: i64 = parts
            .next()
            .and_then(|raw| raw.parse().ok())
            .ok_or(TokenError::Invalid)?;
        if parts.next().is_some() {
            return Err(TokenError::Invalid);
        }

        if now.timestamp() >= issued.saturating_add(ttl) {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            application: ApplicationId(application),
            action,
        })
    }

    /// Full applicant-facing URL carrying a freshly issued token.
    pub fn magic_link(&self, application: &ApplicationId, action: ActionType) -> String {
        format!(
            "{}/grant-applications/resume/{}",
            self.frontend_base_url,
            self.issue(application, action),
        )
    }

    fn mac(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .expect("hmac accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
