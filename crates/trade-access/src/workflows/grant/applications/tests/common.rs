use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use axum::Router;
use serde_json::Value;

use crate::workflows::grant::applications::{
    application_router, Application, ApplicationDraft, ApplicationFilter, ApplicationId,
    ApplicationRepository, ApplicationRouterState, ApplicationService, EmployeeBand,
    RepositoryError, StateAid, StateAidId,
};
use crate::workflows::grant::evidence::MagicLinkIssuer;
use crate::workflows::grant::notify::{NotificationDispatcher, NotifyError, NotifyGateway};
use crate::workflows::grant::process::{ProcessId, ProcessRecord, ProcessRepository, TaskId};
use crate::workflows::grant::process::engine::WorkflowEngine;

#[derive(Default)]
pub(super) struct MemoryApplications {
    rows: Mutex<HashMap<ApplicationId, Application>>,
    aid: Mutex<HashMap<StateAidId, StateAid>>,
}

impl ApplicationRepository for MemoryApplications {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        self.rows
            .lock()
            .expect("lock")
            .insert(application.id, application.clone());
        Ok(application)
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().expect("lock");
        if !rows.contains_key(&application.id) {
            return Err(RepositoryError::NotFound);
        }
        rows.insert(application.id, application);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.rows.lock().expect("lock").get(id).cloned())
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        let rows = self.rows.lock().expect("lock");
        let mut out: Vec<Application> = rows
            .values()
            .filter(|application| {
                filter
                    .sent_for_review
                    .map_or(true, |wanted| application.sent_for_review == wanted)
                    && (!filter.active_only || application.is_active)
            })
            .cloned()
            .collect();
        out.sort_by_key(|application| application.created_at);
        Ok(out)
    }

    fn insert_state_aid(&self, aid: StateAid) -> Result<StateAid, RepositoryError> {
        self.aid.lock().expect("lock").insert(aid.id, aid.clone());
        Ok(aid)
    }

    fn update_state_aid(&self, aid: StateAid) -> Result<(), RepositoryError> {
        let mut rows = self.aid.lock().expect("lock");
        if !rows.contains_key(&aid.id) {
            return Err(RepositoryError::NotFound);
        }
        rows.insert(aid.id, aid);
        Ok(())
    }

    fn delete_state_aid(&self, id: &StateAidId) -> Result<(), RepositoryError> {
        self.aid
            .lock()
            .expect("lock")
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn fetch_state_aid(&self, id: &StateAidId) -> Result<Option<StateAid>, RepositoryError> {
        Ok(self.aid.lock().expect("lock").get(id).cloned())
    }

    fn state_aid_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<StateAid>, RepositoryError> {
        let mut out: Vec<StateAid> = self
            .aid
            .lock()
            .expect("lock")
            .values()
            .filter(|aid| aid.grant_application == *application)
            .cloned()
            .collect();
        out.sort_by_key(|aid| aid.created_at);
        Ok(out)
    }
}

#[derive(Default)]
pub(super) struct MemoryProcesses {
    rows: Mutex<HashMap<ProcessId, ProcessRecord>>,
}

impl ProcessRepository for MemoryProcesses {
    fn create(&self, record: ProcessRecord) -> Result<ProcessRecord, RepositoryError> {
        let mut rows = self.rows.lock().expect("lock");
        if rows
            .values()
            .any(|existing| existing.process.application == record.process.application)
        {
            return Err(RepositoryError::Conflict);
        }
        rows.insert(record.process.id, record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ProcessId) -> Result<Option<ProcessRecord>, RepositoryError> {
        Ok(self.rows.lock().expect("lock").get(id).cloned())
    }

    fn find_by_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<ProcessRecord>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .expect("lock")
            .values()
            .find(|record| record.process.application == *application)
            .cloned())
    }

    fn find_by_task(&self, task: &TaskId) -> Result<Option<ProcessRecord>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .expect("lock")
            .values()
            .find(|record| record.task(task).is_some())
            .cloned())
    }

    fn update(&self, record: ProcessRecord) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().expect("lock");
        if !rows.contains_key(&record.process.id) {
            return Err(RepositoryError::NotFound);
        }
        rows.insert(record.process.id, record);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotify {
    delivered: Mutex<Vec<String>>,
}

impl MemoryNotify {
    pub(super) fn sent(&self, template: &str) -> usize {
        self.delivered
            .lock()
            .expect("lock")
            .iter()
            .filter(|name| *name == template)
            .count()
    }
}

impl NotifyGateway for MemoryNotify {
    fn template_id(&self, name: &str) -> Result<String, NotifyError> {
        Ok(name.to_string())
    }

    fn deliver(
        &self,
        template_id: &str,
        _recipient: &str,
        _personalisation: &BTreeMap<String, String>,
    ) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .expect("lock")
            .push(template_id.to_string());
        Ok(())
    }

    fn preview(
        &self,
        template_id: &str,
        _personalisation: &BTreeMap<String, String>,
    ) -> Result<String, NotifyError> {
        Ok(format!("preview of {template_id}"))
    }
}

pub(super) struct Env {
    pub(super) router: Router,
    pub(super) service: Arc<ApplicationService<MemoryApplications>>,
    pub(super) notify: Arc<MemoryNotify>,
}

pub(super) fn build_env() -> Env {
    let applications = Arc::new(MemoryApplications::default());
    let processes = Arc::new(MemoryProcesses::default());
    let notify = Arc::new(MemoryNotify::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(notify.clone(), true));
    let issuer = MagicLinkIssuer::new("test-secret", 3600, "http://localhost:8000");

    let service = Arc::new(ApplicationService::new(applications.clone()));
    let engine = Arc::new(WorkflowEngine::new(
        applications,
        processes,
        dispatcher,
        issuer,
    ));
    let router = application_router(ApplicationRouterState {
        service: service.clone(),
        engine,
    });

    Env {
        router,
        service,
        notify,
    }
}

pub(super) fn build_service() -> Arc<ApplicationService<MemoryApplications>> {
    Arc::new(ApplicationService::new(Arc::new(
        MemoryApplications::default(),
    )))
}

pub(super) fn draft() -> ApplicationDraft {
    ApplicationDraft {
        applicant_full_name: Some("Ada Lovelace".to_string()),
        applicant_email: Some("a@x".to_string()),
        previous_applications: Some(1),
        number_of_employees: Some(EmployeeBand::TenToFortyNine),
        turnover_greater_than_threshold: Some(false),
        event_committed: Some(false),
        ..ApplicationDraft::default()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
