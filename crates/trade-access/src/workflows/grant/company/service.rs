use std::sync::Arc;

use chrono::Utc;

use super::domain::{Company, CompanyId, CompanyPayload, DnbSnapshot};
use super::gateway::{CompanyDataGateway, RetryingGateway, UpstreamError};
use super::repository::CompanyRepository;
use crate::workflows::grant::applications::RepositoryError;

/// Cache-preferring reads over the company-data provider.
pub struct CompanyService<R, G> {
    repository: Arc<R>,
    gateway: RetryingGateway<G>,
}

/// A company together with the provider data backing it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompanyView {
    pub company: Company,
    pub data: Option<CompanyPayload>,
}

#[derive(Debug, thiserror::Error)]
pub enum CompanyServiceError {
    #[error("company {0} not found")]
    NotFound(CompanyId),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl<R, G> CompanyService<R, G>
where
    R: CompanyRepository + 'static,
    G: CompanyDataGateway + 'static,
{
    pub fn new(repository: Arc<R>, gateway: Arc<G>) -> Self {
        Self {
            repository,
            gateway: RetryingGateway::new(gateway),
        }
    }

    /// Register a company in the local cache. The same DUNS number maps to
    /// the existing row.
    pub fn register(&self, payload: CompanyPayload) -> Result<Company, CompanyServiceError> {
        let now = Utc::now();
        if let Some(mut existing) = self.repository.fetch_by_duns(&payload.duns_number)? {
            existing.primary_name = payload.primary_name;
            existing.registration_number = payload.registration_number;
            existing.address_country = payload.address_country;
            existing.address_town = payload.address_town;
            existing.updated_at = now;
            return Ok(self.repository.upsert(existing)?);
        }
        Ok(self.repository.upsert(payload.into_company(now))?)
    }

    pub fn list(&self) -> Result<Vec<Company>, CompanyServiceError> {
        Ok(self.repository.list()?)
    }

    /// Fetch a company with its provider data, preferring the stored
    /// snapshot. Only a cache miss reaches the remote; fresh responses are
    /// appended as new snapshots with history retained.
    pub fn get_company(&self, id: &CompanyId) -> Result<CompanyView, CompanyServiceError> {
        let company = self
            .repository
            .fetch(id)?
            .ok_or(CompanyServiceError::NotFound(*id))?;

        if let Some(snapshot) = self.repository.latest_snapshot(id)? {
            return Ok(CompanyView {
                company,
                data: Some(snapshot.payload),
            });
        }

        let fetched = self.gateway.lookup(&company.duns_number)?;
        if let Some(payload) = &fetched {
            self.repository
                .append_snapshot(DnbSnapshot::new(company.id, payload.clone(), Utc::now()))?;
        }
        Ok(CompanyView {
            company,
            data: fetched,
        })
    }

    pub fn search_by_term(&self, term: &str) -> Result<Vec<CompanyPayload>, CompanyServiceError> {
        Ok(self.gateway.search(term)?)
    }

    pub fn search_by_duns(
        &self,
        duns_number: &str,
    ) -> Result<Vec<CompanyPayload>, CompanyServiceError> {
        Ok(self.gateway.lookup(duns_number)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::grant::company::gateway::GatewayError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryCompanies {
        rows: Mutex<HashMap<CompanyId, Company>>,
        snapshots: Mutex<Vec<DnbSnapshot>>,
    }

    impl CompanyRepository for MemoryCompanies {
        fn upsert(&self, company: Company) -> Result<Company, RepositoryError> {
            self.rows
                .lock()
                .expect("lock")
                .insert(company.id, company.clone());
            Ok(company)
        }

        fn fetch(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
            Ok(self.rows.lock().expect("lock").get(id).cloned())
        }

        fn fetch_by_duns(&self, duns_number: &str) -> Result<Option<Company>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .expect("lock")
                .values()
                .find(|company| company.duns_number == duns_number)
                .cloned())
        }

        fn list(&self) -> Result<Vec<Company>, RepositoryError> {
            Ok(self.rows.lock().expect("lock").values().cloned().collect())
        }

        fn append_snapshot(&self, snapshot: DnbSnapshot) -> Result<(), RepositoryError> {
            self.snapshots.lock().expect("lock").push(snapshot);
            Ok(())
        }

        fn latest_snapshot(
            &self,
            company: &CompanyId,
        ) -> Result<Option<DnbSnapshot>, RepositoryError> {
            Ok(self
                .snapshots
                .lock()
                .expect("lock")
                .iter()
                .filter(|snapshot| snapshot.company == *company)
                .max_by_key(|snapshot| snapshot.created_at)
                .cloned())
        }
    }

    struct CountingGateway {
        calls: AtomicU32,
        payload: Option<CompanyPayload>,
    }

    impl CompanyDataGateway for CountingGateway {
        fn lookup(&self, _duns_number: &str) -> Result<Option<CompanyPayload>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }

        fn search(&self, _term: &str) -> Result<Vec<CompanyPayload>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone().into_iter().collect())
        }
    }

    fn payload() -> CompanyPayload {
        CompanyPayload {
            duns_number: "123456789".to_string(),
            primary_name: "Acme Exports Ltd".to_string(),
            registration_number: Some("00112233".to_string()),
            address_country: "GB".to_string(),
            address_town: Some("Leeds".to_string()),
        }
    }

    fn build() -> (
        CompanyService<MemoryCompanies, CountingGateway>,
        Arc<MemoryCompanies>,
        Arc<CountingGateway>,
    ) {
        let repository = Arc::new(MemoryCompanies::default());
        let gateway = Arc::new(CountingGateway {
            calls: AtomicU32::new(0),
            payload: Some(payload()),
        });
        let service = CompanyService::new(repository.clone(), gateway.clone());
        (service, repository, gateway)
    }

    #[test]
    fn a_stored_snapshot_short_circuits_the_remote() {
        let (service, repository, gateway) = build();
        let company = service.register(payload()).expect("register");
        repository
            .append_snapshot(DnbSnapshot::new(company.id, payload(), Utc::now()))
            .expect("seed snapshot");

        let view = service.get_company(&company.id).expect("get");
        assert!(view.data.is_some());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn a_cache_miss_calls_the_remote_and_appends_a_snapshot() {
        let (service, repository, gateway) = build();
        let company = service.register(payload()).expect("register");

        let view = service.get_company(&company.id).expect("get");
        assert!(view.data.is_some());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert!(repository
            .latest_snapshot(&company.id)
            .expect("snapshot query")
            .is_some());

        // The snapshot now serves subsequent reads.
        service.get_company(&company.id).expect("get again");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshot_history_is_retained() {
        let (service, repository, _) = build();
        let company = service.register(payload()).expect("register");
        let earlier = Utc::now() - chrono::Duration::hours(1);
        repository
            .append_snapshot(DnbSnapshot::new(company.id, payload(), earlier))
            .expect("old snapshot");
        let mut renamed = payload();
        renamed.primary_name = "Acme Global Ltd".to_string();
        repository
            .append_snapshot(DnbSnapshot::new(company.id, renamed, Utc::now()))
            .expect("new snapshot");

        let view = service.get_company(&company.id).expect("get");
        assert_eq!(
            view.data.map(|data| data.primary_name),
            Some("Acme Global Ltd".to_string())
        );
        assert_eq!(repository.snapshots.lock().expect("lock").len(), 2);
    }

    #[test]
    fn registering_the_same_duns_twice_updates_in_place() {
        let (service, _, _) = build();
        let first = service.register(payload()).expect("first");
        let mut changed = payload();
        changed.primary_name = "Acme Global Ltd".to_string();
        let second = service.register(changed).expect("second");

        assert_eq!(first.id, second.id);
        assert_eq!(second.primary_name, "Acme Global Ltd");
        assert_eq!(service.list().expect("list").len(), 1);
    }

    #[test]
    fn unknown_companies_are_not_found() {
        let (service, _, _) = build();
        let result = service.get_company(&CompanyId::new());
        assert!(matches!(result, Err(CompanyServiceError::NotFound(_))));
    }
}
