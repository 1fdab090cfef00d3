use super::domain::{Application, ApplicationId, StateAid, StateAidId};

/// Storage abstraction so the service layer can be exercised in isolation.
/// Updates are transactional per call; the in-memory implementations take a
/// single lock for the duration of each method.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn update(&self, application: Application) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError>;

    fn insert_state_aid(&self, aid: StateAid) -> Result<StateAid, RepositoryError>;
    fn update_state_aid(&self, aid: StateAid) -> Result<(), RepositoryError>;
    fn delete_state_aid(&self, id: &StateAidId) -> Result<(), RepositoryError>;
    fn fetch_state_aid(&self, id: &StateAidId) -> Result<Option<StateAid>, RepositoryError>;
    fn state_aid_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<StateAid>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Filters accepted by `list`.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub sent_for_review: Option<bool>,
    pub active_only: bool,
}
