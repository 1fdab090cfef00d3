//! The review flow graph as data.
//!
//! Nodes are steps; an edge means "on completion, activate the
//! successor(s)". Human steps under a split carry the name of the join
//! barrier they report to. The one deliberately dynamic edge is
//! `send-evidence-decision-email`, whose successor depends on the evidence
//! outcome and is resolved by the engine's handler dispatch.

use super::domain::TaskKind;

/// One node of the flow graph.
#[derive(Debug, Clone, Copy)]
pub struct StepDescriptor {
    pub name: &'static str,
    pub kind: TaskKind,
    pub successors: &'static [&'static str],
    /// For splits, the join to arm; for humans under a split, the join to
    /// report to.
    pub barrier: Option<&'static str>,
}

pub const START: &str = "start";
pub const SEND_SUBMITTED_EMAIL: &str = "send-submitted-email";
pub const VERIFY_SPLIT: &str = "verify-split";
pub const VERIFY_PREVIOUS_APPLICATIONS: &str = "verify-previous-applications";
pub const VERIFY_EVENT_COMMITMENT: &str = "verify-event-commitment";
pub const VERIFY_BUSINESS_ENTITY: &str = "verify-business-entity";
pub const VERIFY_STATE_AID: &str = "verify-state-aid";
pub const VERIFY_JOIN: &str = "verify-join";
pub const REQUEST_EVENT_BOOKING_EVIDENCE: &str = "request-event-booking-evidence";
pub const SEND_EVIDENCE_REQUEST: &str = "send-evidence-request";
pub const REVIEW_EVIDENCE: &str = "review-evidence";
pub const RENEW_PROOF_OF_EVENT_BOOKING: &str = "renew-proof-of-event-booking";
pub const SEND_EVIDENCE_DECISION_EMAIL: &str = "send-evidence-decision-email";
pub const SUITABILITY_SPLIT: &str = "suitability-split";
pub const PRODUCTS_AND_SERVICES: &str = "products-and-services";
pub const PRODUCTS_AND_SERVICES_COMPETITORS: &str = "products-and-services-competitors";
pub const EXPORT_STRATEGY: &str = "export-strategy";
pub const EVENT_IS_APPROPRIATE: &str = "event-is-appropriate";
pub const SUITABILITY_JOIN: &str = "suitability-join";
pub const DECISION: &str = "decision";
pub const SEND_DECISION_EMAIL: &str = "send-decision-email";
pub const END: &str = "end";

static STEPS: &[StepDescriptor] = &[
    StepDescriptor {
        name: START,
        kind: TaskKind::Start,
        successors: &[SEND_SUBMITTED_EMAIL],
        barrier: None,
    },
    StepDescriptor {
        name: SEND_SUBMITTED_EMAIL,
        kind: TaskKind::Handler,
        successors: &[VERIFY_SPLIT],
        barrier: None,
    },
    StepDescriptor {
        name: VERIFY_SPLIT,
        kind: TaskKind::Split,
        successors: &[
            VERIFY_PREVIOUS_APPLICATIONS,
            VERIFY_EVENT_COMMITMENT,
            VERIFY_BUSINESS_ENTITY,
            VERIFY_STATE_AID,
        ],
        barrier: Some(VERIFY_JOIN),
    },
    StepDescriptor {
        name: VERIFY_PREVIOUS_APPLICATIONS,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(VERIFY_JOIN),
    },
    StepDescriptor {
        name: VERIFY_EVENT_COMMITMENT,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(VERIFY_JOIN),
    },
    StepDescriptor {
        name: VERIFY_BUSINESS_ENTITY,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(VERIFY_JOIN),
    },
    StepDescriptor {
        name: VERIFY_STATE_AID,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(VERIFY_JOIN),
    },
    StepDescriptor {
        name: VERIFY_JOIN,
        kind: TaskKind::Join,
        successors: &[REQUEST_EVENT_BOOKING_EVIDENCE],
        barrier: None,
    },
    StepDescriptor {
        name: REQUEST_EVENT_BOOKING_EVIDENCE,
        kind: TaskKind::Human,
        successors: &[SEND_EVIDENCE_REQUEST],
        barrier: None,
    },
    StepDescriptor {
        name: SEND_EVIDENCE_REQUEST,
        kind: TaskKind::Handler,
        successors: &[REVIEW_EVIDENCE],
        barrier: None,
    },
    StepDescriptor {
        name: REVIEW_EVIDENCE,
        kind: TaskKind::Function,
        successors: &[RENEW_PROOF_OF_EVENT_BOOKING],
        barrier: None,
    },
    StepDescriptor {
        name: RENEW_PROOF_OF_EVENT_BOOKING,
        kind: TaskKind::Human,
        successors: &[SEND_EVIDENCE_DECISION_EMAIL],
        barrier: None,
    },
    StepDescriptor {
        name: SEND_EVIDENCE_DECISION_EMAIL,
        kind: TaskKind::Handler,
        successors: &[],
        barrier: None,
    },
    StepDescriptor {
        name: SUITABILITY_SPLIT,
        kind: TaskKind::Split,
        successors: &[
            PRODUCTS_AND_SERVICES,
            PRODUCTS_AND_SERVICES_COMPETITORS,
            EXPORT_STRATEGY,
            EVENT_IS_APPROPRIATE,
        ],
        barrier: Some(SUITABILITY_JOIN),
    },
    StepDescriptor {
        name: PRODUCTS_AND_SERVICES,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(SUITABILITY_JOIN),
    },
    StepDescriptor {
        name: PRODUCTS_AND_SERVICES_COMPETITORS,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(SUITABILITY_JOIN),
    },
    StepDescriptor {
        name: EXPORT_STRATEGY,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(SUITABILITY_JOIN),
    },
    StepDescriptor {
        name: EVENT_IS_APPROPRIATE,
        kind: TaskKind::Human,
        successors: &[],
        barrier: Some(SUITABILITY_JOIN),
    },
    StepDescriptor {
        name: SUITABILITY_JOIN,
        kind: TaskKind::Join,
        successors: &[DECISION],
        barrier: None,
    },
    StepDescriptor {
        name: DECISION,
        kind: TaskKind::Human,
        successors: &[SEND_DECISION_EMAIL],
        barrier: None,
    },
    StepDescriptor {
        name: SEND_DECISION_EMAIL,
        kind: TaskKind::Handler,
        successors: &[END],
        barrier: None,
    },
    StepDescriptor {
        name: END,
        kind: TaskKind::End,
        successors: &[],
        barrier: None,
    },
];

/// Look a step up by name.
pub fn step(name: &str) -> Option<&'static StepDescriptor> {
    STEPS.iter().find(|descriptor| descriptor.name == name)
}
