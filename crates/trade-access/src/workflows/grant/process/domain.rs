use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::workflows::grant::applications::ApplicationId;

/// Identifier wrapper for review processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProcessId(pub Uuid);

impl ProcessId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier wrapper for reviewer tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "finished")]
    Finished,
}

/// Outcome of one reviewer verification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationFlag {
    #[serde(rename = "unset")]
    Unset,
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "challenged")]
    Challenged,
}

/// Final decision recorded on the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    #[serde(rename = "unset")]
    Unset,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "rejected")]
    Rejected,
}

/// A single suitability score with the reviewer's justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuitabilityScore {
    pub score: u8,
    pub justification: String,
}

/// Review state for one submitted application.
///
/// Verification flags and suitability scores are only meaningful once the
/// corresponding task has completed; until then they hold `Unset`/`None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Process {
    pub id: ProcessId,
    pub application: ApplicationId,
    pub status: ProcessStatus,

    // Eligibility verification outcomes.
    pub previous_applications_verified: VerificationFlag,
    pub event_commitment_verified: VerificationFlag,
    pub business_entity_verified: VerificationFlag,
    pub state_aid_verified: VerificationFlag,

    // Suitability scoring outcomes.
    pub products_and_services: Option<SuitabilityScore>,
    pub products_and_services_competitors: Option<SuitabilityScore>,
    pub export_strategy: Option<SuitabilityScore>,
    pub event_is_appropriate: Option<bool>,
    pub event_appropriateness_justification: Option<String>,

    // Evidence lifecycle flags.
    pub event_evidence_requested: bool,
    pub event_evidence_uploaded: bool,
    pub event_evidence_approved: bool,
    pub evidence_renewal_cycles: u8,

    pub decision: Decision,
    pub decision_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Process {
    pub(crate) fn new(application: ApplicationId, now: DateTime<Utc>) -> Self {
        Self {
            id: ProcessId::new(),
            application,
            status: ProcessStatus::Active,
            previous_applications_verified: VerificationFlag::Unset,
            event_commitment_verified: VerificationFlag::Unset,
            business_entity_verified: VerificationFlag::Unset,
            state_aid_verified: VerificationFlag::Unset,
            products_and_services: None,
            products_and_services_competitors: None,
            export_strategy: None,
            event_is_appropriate: None,
            event_appropriateness_justification: None,
            event_evidence_requested: false,
            event_evidence_uploaded: false,
            event_evidence_approved: false,
            evidence_renewal_cycles: 0,
            decision: Decision::Unset,
            decision_reason: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Count of verification checks a reviewer confirmed, 0 through 4.
    pub fn total_verified(&self) -> u8 {
        [
            self.previous_applications_verified,
            self.event_commitment_verified,
            self.business_entity_verified,
            self.state_aid_verified,
        ]
        .iter()
        .filter(|flag| **flag == VerificationFlag::Confirmed)
        .count() as u8
    }

    /// Sum of the three scored suitability answers, 3 through 15. `None`
    /// until all three scoring tasks have completed.
    pub fn suitability_score(&self) -> Option<u8> {
        match (
            &self.products_and_services,
            &self.products_and_services_competitors,
            &self.export_strategy,
        ) {
            (Some(a), Some(b), Some(c)) => Some(a.score + b.score + c.score),
            _ => None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approved
    }
}

/// The kind of work a step asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskKind {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "handler")]
    Handler,
    #[serde(rename = "split")]
    Split,
    #[serde(rename = "join")]
    Join,
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "end")]
    End,
}

/// One unit of work on a process. Human tasks wait for a reviewer;
/// function tasks wait for an external trigger; the rest close as soon as
/// the engine runs them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub process: ProcessId,
    pub step: String,
    pub kind: TaskKind,
    pub assigned_reviewer: Option<String>,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub(crate) fn open(
        process: ProcessId,
        step: &str,
        kind: TaskKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            process,
            step: step.to_string(),
            kind,
            assigned_reviewer: None,
            payload: None,
            created_at: now,
            finished_at: None,
        }
    }

    pub(crate) fn closed(
        process: ProcessId,
        step: &str,
        kind: TaskKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            finished_at: Some(now),
            ..Self::open(process, step, kind, now)
        }
    }

    pub fn is_active(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// One line of the per-process audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub step: String,
    pub event: String,
}

impl TransitionRecord {
    pub(crate) fn new(step: &str, event: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            at,
            step: step.to_string(),
            event: event.into(),
        }
    }
}
