//! Evidence documents and the magic-link tokens that gate them.

pub mod router;
pub mod store;
pub mod token;

pub use router::evidence_router;
pub use store::{
    ArtifactId, ArtifactRepository, EvidenceArtifact, EvidenceError, EvidenceEvents, EvidenceStore,
};
pub use token::{ActionType, MagicLinkIssuer, TokenError, VerifiedToken};
