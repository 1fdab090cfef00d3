//! Application store: the applicant-facing aggregate and its state-aid
//! children, plus the HTTP surface for the back office.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationPatch, EmployeeBand, StateAid,
    StateAidDraft, StateAidId, StateAidPatch, SummaryBlock, SummaryRow,
};
pub use repository::{ApplicationFilter, ApplicationRepository, RepositoryError};
pub use router::{application_router, ApplicationRouterState};
pub use service::{ApplicationService, ApplicationServiceError, InvariantViolation};
