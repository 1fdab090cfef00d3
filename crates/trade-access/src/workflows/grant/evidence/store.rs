//! Applicant evidence uploads.
//!
//! Uploads arrive out-of-band, authorised only by a magic-link token. The
//! store verifies the token, notifies the workflow engine that evidence has
//! landed, then persists the artifact bytes.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::token::{ActionType, MagicLinkIssuer, TokenError};
use crate::workflows::grant::applications::{ApplicationId, RepositoryError};

/// Identifier wrapper for uploaded evidence artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One uploaded document, stored verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceArtifact {
    pub id: ArtifactId,
    pub application: ApplicationId,
    pub mime_type: String,
    #[serde(skip_serializing)]
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Persistence for uploaded artifacts.
pub trait ArtifactRepository: Send + Sync {
    fn insert(&self, artifact: EvidenceArtifact) -> Result<EvidenceArtifact, RepositoryError>;
    fn fetch(&self, id: &ArtifactId) -> Result<Option<EvidenceArtifact>, RepositoryError>;
    fn for_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<EvidenceArtifact>, RepositoryError>;
}

/// Callback into the workflow engine when evidence arrives.
///
/// `awaiting_evidence` is a read-only check; `evidence_received` advances
/// the workflow and must only fire once the artifact is safely stored.
pub trait EvidenceEvents: Send + Sync {
    fn awaiting_evidence(&self, application: &ApplicationId) -> Result<(), EvidenceError>;
    fn evidence_received(&self, application: &ApplicationId) -> Result<(), EvidenceError>;
}

/// Errors surfaced by the upload path.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("magic-link token does not authorise evidence upload")]
    WrongAction,
    #[error("application {0} is not awaiting evidence")]
    NotAwaitingEvidence(ApplicationId),
    #[error("evidence artifact {0} not found")]
    ArtifactNotFound(ArtifactId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Evidence store gating artifact writes behind token verification.
pub struct EvidenceStore<R, E> {
    issuer: MagicLinkIssuer,
    artifacts: Arc<R>,
    events: Arc<E>,
}

impl<R, E> EvidenceStore<R, E>
where
    R: ArtifactRepository + 'static,
    E: EvidenceEvents + 'static,
{
    pub fn new(issuer: MagicLinkIssuer, artifacts: Arc<R>, events: Arc<E>) -> Self {
        Self {
            issuer,
            artifacts,
            events,
        }
    }

    /// Accept an upload. The engine is consulted before the artifact is
    /// stored so a process that is not awaiting evidence rejects the write
    /// outright, but the workflow only advances after the write lands. A
    /// failed write therefore leaves the process still awaiting and the
    /// same token retryable.
    pub fn upload(
        &self,
        token: &str,
        mime_type: String,
        content: Vec<u8>,
    ) -> Result<EvidenceArtifact, EvidenceError> {
        let verified = self.issuer.verify(token)?;
        if verified.action != ActionType::UploadEventEvidence {
            return Err(EvidenceError::WrongAction);
        }

        self.events.awaiting_evidence(&verified.application)?;

        let artifact = EvidenceArtifact {
            id: ArtifactId::new(),
            application: verified.application,
            mime_type,
            content,
            created_at: Utc::now(),
        };
        let artifact = self.artifacts.insert(artifact)?;

        self.events.evidence_received(&verified.application)?;
        Ok(artifact)
    }

    pub fn fetch(&self, id: &ArtifactId) -> Result<EvidenceArtifact, EvidenceError> {
        self.artifacts
            .fetch(id)?
            .ok_or(EvidenceError::ArtifactNotFound(*id))
    }

    pub fn artifacts_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<EvidenceArtifact>, EvidenceError> {
        Ok(self.artifacts.for_application(application)?)
    }
}
