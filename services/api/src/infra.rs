use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use trade_access::config::DnbConfig;
use trade_access::workflows::grant::applications::{
    Application, ApplicationFilter, ApplicationId, ApplicationRepository, RepositoryError,
    StateAid, StateAidId,
};
use trade_access::workflows::grant::company::{
    Company, CompanyDataGateway, CompanyId, CompanyPayload, CompanyRepository, DnbSnapshot,
    GatewayError,
};
use trade_access::workflows::grant::evidence::{ArtifactId, ArtifactRepository, EvidenceArtifact};
use trade_access::workflows::grant::notify::{NotifyError, NotifyGateway};
use trade_access::workflows::grant::process::{ProcessId, ProcessRecord, ProcessRepository, TaskId};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    applications: Arc<Mutex<HashMap<ApplicationId, Application>>>,
    state_aid: Arc<Mutex<HashMap<StateAidId, StateAid>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.applications.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id, application.clone());
        Ok(application)
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            guard.insert(application.id, application);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let guard = self.applications.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        let guard = self.applications.lock().expect("repository mutex poisoned");
        let mut rows: Vec<Application> = guard
            .values()
            .filter(|application| {
                filter
                    .sent_for_review
                    .map_or(true, |wanted| application.sent_for_review == wanted)
                    && (!filter.active_only || application.is_active)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|application| application.created_at);
        Ok(rows)
    }

    fn insert_state_aid(&self, aid: StateAid) -> Result<StateAid, RepositoryError> {
        let mut guard = self.state_aid.lock().expect("repository mutex poisoned");
        if guard.contains_key(&aid.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(aid.id, aid.clone());
        Ok(aid)
    }

    fn update_state_aid(&self, aid: StateAid) -> Result<(), RepositoryError> {
        let mut guard = self.state_aid.lock().expect("repository mutex poisoned");
        if guard.contains_key(&aid.id) {
            guard.insert(aid.id, aid);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn delete_state_aid(&self, id: &StateAidId) -> Result<(), RepositoryError> {
        let mut guard = self.state_aid.lock().expect("repository mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn fetch_state_aid(&self, id: &StateAidId) -> Result<Option<StateAid>, RepositoryError> {
        let guard = self.state_aid.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn state_aid_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<StateAid>, RepositoryError> {
        let guard = self.state_aid.lock().expect("repository mutex poisoned");
        let mut rows: Vec<StateAid> = guard
            .values()
            .filter(|aid| aid.grant_application == *application)
            .cloned()
            .collect();
        rows.sort_by_key(|aid| aid.created_at);
        Ok(rows)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryProcessRepository {
    records: Arc<Mutex<HashMap<ProcessId, ProcessRecord>>>,
}

impl ProcessRepository for InMemoryProcessRepository {
    fn create(&self, record: ProcessRecord) -> Result<ProcessRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard
            .values()
            .any(|existing| existing.process.application == record.process.application)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.process.id, record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ProcessId) -> Result<Option<ProcessRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<ProcessRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|record| record.process.application == *application)
            .cloned())
    }

    fn find_by_task(&self, task: &TaskId) -> Result<Option<ProcessRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|record| record.task(task).is_some())
            .cloned())
    }

    fn update(&self, record: ProcessRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.process.id) {
            guard.insert(record.process.id, record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCompanyRepository {
    companies: Arc<Mutex<HashMap<CompanyId, Company>>>,
    snapshots: Arc<Mutex<Vec<DnbSnapshot>>>,
}

impl CompanyRepository for InMemoryCompanyRepository {
    fn upsert(&self, company: Company) -> Result<Company, RepositoryError> {
        let mut guard = self.companies.lock().expect("repository mutex poisoned");
        guard.insert(company.id, company.clone());
        Ok(company)
    }

    fn fetch(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_duns(&self, duns_number: &str) -> Result<Option<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|company| company.duns_number == duns_number)
            .cloned())
    }

    fn list(&self) -> Result<Vec<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("repository mutex poisoned");
        let mut rows: Vec<Company> = guard.values().cloned().collect();
        rows.sort_by_key(|company| company.created_at);
        Ok(rows)
    }

    fn append_snapshot(&self, snapshot: DnbSnapshot) -> Result<(), RepositoryError> {
        let mut guard = self.snapshots.lock().expect("snapshot mutex poisoned");
        guard.push(snapshot);
        Ok(())
    }

    fn latest_snapshot(
        &self,
        company: &CompanyId,
    ) -> Result<Option<DnbSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("snapshot mutex poisoned");
        Ok(guard
            .iter()
            .filter(|snapshot| snapshot.company == *company)
            .max_by_key(|snapshot| snapshot.created_at)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryArtifactRepository {
    artifacts: Arc<Mutex<HashMap<ArtifactId, EvidenceArtifact>>>,
}

impl ArtifactRepository for InMemoryArtifactRepository {
    fn insert(&self, artifact: EvidenceArtifact) -> Result<EvidenceArtifact, RepositoryError> {
        let mut guard = self.artifacts.lock().expect("artifact mutex poisoned");
        guard.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    fn fetch(&self, id: &ArtifactId) -> Result<Option<EvidenceArtifact>, RepositoryError> {
        let guard = self.artifacts.lock().expect("artifact mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<EvidenceArtifact>, RepositoryError> {
        let guard = self.artifacts.lock().expect("artifact mutex poisoned");
        let mut rows: Vec<EvidenceArtifact> = guard
            .values()
            .filter(|artifact| artifact.application == *application)
            .cloned()
            .collect();
        rows.sort_by_key(|artifact| artifact.created_at);
        Ok(rows)
    }
}

/// Notify gateway for deployments without provider credentials: template
/// names double as template ids and every send lands in the log.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifyGateway;

impl NotifyGateway for LoggingNotifyGateway {
    fn template_id(&self, name: &str) -> Result<String, NotifyError> {
        Ok(name.to_string())
    }

    fn deliver(
        &self,
        template_id: &str,
        recipient: &str,
        personalisation: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), NotifyError> {
        info!(template_id, recipient, ?personalisation, "notification delivered");
        Ok(())
    }

    fn preview(
        &self,
        template_id: &str,
        personalisation: &std::collections::BTreeMap<String, String>,
    ) -> Result<String, NotifyError> {
        Ok(format!("template {template_id} with {personalisation:?}"))
    }
}

#[derive(Debug, Deserialize)]
struct DnbSearchResponse {
    results: Vec<CompanyPayload>,
}

/// HTTP client for the dnb-service company-data provider.
pub(crate) struct HttpCompanyGateway {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpCompanyGateway {
    pub(crate) fn new(config: &DnbConfig) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            base_url: config.service_url.trim_end_matches('/').to_string(),
            token: config.service_token.clone(),
        }
    }

    fn get(
        &self,
        url: &str,
        query: Option<(&str, &str)>,
    ) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let mut request = self.agent.get(url);
        if let Some(token) = &self.token {
            request = request.header("authorization", format!("Token {token}"));
        }
        if let Some((key, value)) = query {
            request = request.query(key, value);
        }
        request.call()
    }
}

impl CompanyDataGateway for HttpCompanyGateway {
    fn lookup(&self, duns_number: &str) -> Result<Option<CompanyPayload>, GatewayError> {
        let url = format!("{}/companies/{duns_number}", self.base_url);
        match self.get(&url, None) {
            Ok(response) => response
                .into_body()
                .read_json::<CompanyPayload>()
                .map(Some)
                .map_err(|err| GatewayError::Transport(err.to_string())),
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(ureq::Error::StatusCode(code)) => Err(GatewayError::Status(code)),
            Err(err) => Err(GatewayError::Transport(err.to_string())),
        }
    }

    fn search(&self, term: &str) -> Result<Vec<CompanyPayload>, GatewayError> {
        let url = format!("{}/companies", self.base_url);
        match self.get(&url, Some(("search_term", term))) {
            Ok(response) => response
                .into_body()
                .read_json::<DnbSearchResponse>()
                .map(|body| body.results)
                .map_err(|err| GatewayError::Transport(err.to_string())),
            Err(ureq::Error::StatusCode(code)) => Err(GatewayError::Status(code)),
            Err(err) => Err(GatewayError::Transport(err.to_string())),
        }
    }
}
