use std::sync::Arc;

use chrono::Utc;

use super::domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationPatch, StateAid, StateAidDraft,
    StateAidId, StateAidPatch, SummaryBlock,
};
use super::repository::{ApplicationFilter, ApplicationRepository, RepositoryError};

const MAX_PREVIOUS_APPLICATIONS: u8 = 6;

/// Service enforcing the aggregate's field invariants and lifecycle rules.
pub struct ApplicationService<R> {
    repository: Arc<R>,
}

impl<R> ApplicationService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create a draft application. Drafts start active and unfrozen.
    pub fn create(&self, draft: ApplicationDraft) -> Result<Application, ApplicationServiceError> {
        check_previous_applications(draft.previous_applications)?;
        let application = Application::from_draft(draft, Utc::now());
        let stored = self.repository.insert(application)?;
        Ok(stored)
    }

    /// Apply a partial update. Rejected once the application is frozen or
    /// deactivated; the answer fields only move while the draft is open.
    pub fn update(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<Application, ApplicationServiceError> {
        let mut application = self.fetch_open(id)?;
        check_previous_applications(patch.previous_applications)?;

        patch.apply(&mut application);
        application.updated_at = Utc::now();
        self.repository.update(application.clone())?;
        Ok(application)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Application, ApplicationServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(ApplicationServiceError::NotFound(*id))
    }

    pub fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        Ok(self.repository.list(filter)?)
    }

    /// Freeze the application at submission time, capturing the summary
    /// snapshot. Freezing an already-frozen application is a no-op so the
    /// submission endpoint stays idempotent.
    pub fn freeze(
        &self,
        id: &ApplicationId,
        summary: Vec<SummaryBlock>,
    ) -> Result<Application, ApplicationServiceError> {
        let mut application = self.get(id)?;
        if !application.is_active {
            return Err(ApplicationServiceError::Inactive(*id));
        }
        if application.sent_for_review {
            return Ok(application);
        }

        application.sent_for_review = true;
        application.application_summary = summary;
        application.updated_at = Utc::now();
        self.repository.update(application.clone())?;
        Ok(application)
    }

    pub fn attach_state_aid(
        &self,
        draft: StateAidDraft,
    ) -> Result<StateAid, ApplicationServiceError> {
        self.fetch_open(&draft.grant_application)?;
        check_state_aid_amount(draft.amount)?;

        let now = Utc::now();
        let aid = StateAid {
            id: StateAidId::new(),
            grant_application: draft.grant_application,
            authority: draft.authority,
            amount: draft.amount,
            description: draft.description,
            date_received: draft.date_received,
            created_at: now,
            updated_at: now,
        };
        let stored = self.repository.insert_state_aid(aid)?;
        Ok(stored)
    }

    pub fn update_state_aid(
        &self,
        id: &StateAidId,
        patch: StateAidPatch,
    ) -> Result<StateAid, ApplicationServiceError> {
        let mut aid = self.fetch_state_aid(id)?;
        self.fetch_open(&aid.grant_application)?;
        if let Some(amount) = patch.amount {
            check_state_aid_amount(amount)?;
            aid.amount = amount;
        }
        if let Some(authority) = patch.authority {
            aid.authority = authority;
        }
        if let Some(description) = patch.description {
            aid.description = description;
        }
        if let Some(date_received) = patch.date_received {
            aid.date_received = date_received;
        }
        aid.updated_at = Utc::now();
        self.repository.update_state_aid(aid.clone())?;
        Ok(aid)
    }

    pub fn delete_state_aid(&self, id: &StateAidId) -> Result<(), ApplicationServiceError> {
        let aid = self.fetch_state_aid(id)?;
        self.fetch_open(&aid.grant_application)?;
        self.repository.delete_state_aid(id)?;
        Ok(())
    }

    /// Clone an existing record onto the same application, a convenience for
    /// businesses reporting several awards from one authority.
    pub fn duplicate_state_aid(
        &self,
        id: &StateAidId,
    ) -> Result<StateAid, ApplicationServiceError> {
        let original = self.fetch_state_aid(id)?;
        self.fetch_open(&original.grant_application)?;

        let now = Utc::now();
        let copy = StateAid {
            id: StateAidId::new(),
            created_at: now,
            updated_at: now,
            ..original
        };
        let stored = self.repository.insert_state_aid(copy)?;
        Ok(stored)
    }

    pub fn list_state_aid(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<StateAid>, ApplicationServiceError> {
        self.get(application)?;
        Ok(self.repository.state_aid_for(application)?)
    }

    fn fetch_state_aid(&self, id: &StateAidId) -> Result<StateAid, ApplicationServiceError> {
        self.repository
            .fetch_state_aid(id)?
            .ok_or(ApplicationServiceError::StateAidNotFound(*id))
    }

    /// Fetch an application that is still accepting mutations.
    fn fetch_open(&self, id: &ApplicationId) -> Result<Application, ApplicationServiceError> {
        let application = self.get(id)?;
        if !application.is_active {
            return Err(ApplicationServiceError::Inactive(*id));
        }
        if application.sent_for_review {
            return Err(ApplicationServiceError::Frozen(*id));
        }
        Ok(application)
    }
}

fn check_previous_applications(value: Option<u8>) -> Result<(), ApplicationServiceError> {
    match value {
        Some(count) if count > MAX_PREVIOUS_APPLICATIONS => Err(
            ApplicationServiceError::Invariant(InvariantViolation::PreviousApplications { count }),
        ),
        _ => Ok(()),
    }
}

fn check_state_aid_amount(amount: u32) -> Result<(), ApplicationServiceError> {
    if amount == 0 {
        return Err(ApplicationServiceError::Invariant(
            InvariantViolation::StateAidAmount,
        ));
    }
    Ok(())
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("state aid record {0} not found")]
    StateAidNotFound(StateAidId),
    #[error("application {0} has been sent for review and is frozen")]
    Frozen(ApplicationId),
    #[error("application {0} is no longer active")]
    Inactive(ApplicationId),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A field value outside its allowed band.
#[derive(Debug, thiserror::Error)]
pub enum InvariantViolation {
    #[error("previous_applications must be between 0 and 6, got {count}")]
    PreviousApplications { count: u8 },
    #[error("state aid amount must be greater than zero")]
    StateAidAmount,
}
