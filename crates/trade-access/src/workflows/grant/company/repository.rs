use super::domain::{Company, CompanyId, DnbSnapshot};
use crate::workflows::grant::applications::RepositoryError;

/// Persistence for cached companies and their provider snapshots.
/// Snapshots are append-only; `latest_snapshot` returns the newest row.
pub trait CompanyRepository: Send + Sync {
    fn upsert(&self, company: Company) -> Result<Company, RepositoryError>;
    fn fetch(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn fetch_by_duns(&self, duns_number: &str) -> Result<Option<Company>, RepositoryError>;
    fn list(&self) -> Result<Vec<Company>, RepositoryError>;

    fn append_snapshot(&self, snapshot: DnbSnapshot) -> Result<(), RepositoryError>;
    fn latest_snapshot(&self, company: &CompanyId)
        -> Result<Option<DnbSnapshot>, RepositoryError>;
}
