use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::workflows::grant::applications::{
    Application, ApplicationDraft, ApplicationFilter, ApplicationId, ApplicationRepository,
    EmployeeBand, RepositoryError, StateAid, StateAidId,
};
use crate::workflows::grant::evidence::MagicLinkIssuer;
use crate::workflows::grant::notify::{NotificationDispatcher, NotifyError, NotifyGateway};
use crate::workflows::grant::process::domain::{ProcessId, Task, TaskId};
use crate::workflows::grant::process::engine::WorkflowEngine;
use crate::workflows::grant::process::repository::{ProcessRecord, ProcessRepository};

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
        Ok(self
            .aid
            .lock()
            .expect("lock")
            .values()
            .filter(|aid| aid.grant_application == *application)
            .cloned()
            .collect())
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

/// Gateway capturing every delivery so tests can assert on the email log.
#[derive(Default)]
pub(super) struct MemoryNotify {
    pub(super) delivered: Mutex<Vec<(String, String)>>,
}

impl NotifyGateway for MemoryNotify {
    fn template_id(&self, name: &str) -> Result<String, NotifyError> {
        Ok(name.to_string())
    }

    fn deliver(
        &self,
        template_id: &str,
        recipient: &str,
        _personalisation: &BTreeMap<String, String>,
    ) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .expect("lock")
            .push((template_id.to_string(), recipient.to_string()));
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

impl MemoryNotify {
    pub(super) fn sent(&self, template: &str) -> usize {
        self.delivered
            .lock()
            .expect("lock")
            .iter()
            .filter(|(name, _)| name == template)
            .count()
    }
}

pub(super) struct Fixture {
    pub(super) engine: Arc<WorkflowEngine<MemoryApplications, MemoryProcesses, MemoryNotify>>,
    pub(super) applications: Arc<MemoryApplications>,
    pub(super) notify: Arc<MemoryNotify>,
}

pub(super) fn issuer() -> MagicLinkIssuer {
    MagicLinkIssuer::new("test-secret", 3600, "http://localhost:8000")
}

pub(super) fn build_engine() -> Fixture {
    let applications = Arc::new(MemoryApplications::default());
    let processes = Arc::new(MemoryProcesses::default());
    let notify = Arc::new(MemoryNotify::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(notify.clone(), true));
    let engine = Arc::new(WorkflowEngine::new(
        applications.clone(),
        processes,
        dispatcher,
        issuer(),
    ));
    Fixture {
        engine,
        applications,
        notify,
    }
}

pub(super) fn submitted_application(fixture: &Fixture) -> ApplicationId {
    let draft = ApplicationDraft {
        applicant_full_name: Some("Ada Lovelace".to_string()),
        applicant_email: Some("a@x".to_string()),
        previous_applications: Some(1),
        number_of_employees: Some(EmployeeBand::TenToFortyNine),
        turnover_greater_than_threshold: Some(false),
        event_committed: Some(false),
        ..ApplicationDraft::default()
    };
    let mut application = Application::from_draft(draft, chrono::Utc::now());
    application.sent_for_review = true;
    let stored = fixture
        .applications
        .insert(application)
        .expect("insert application");
    stored.id
}

/// As `submitted_application`, but the applicant left no email address.
pub(super) fn submitted_application_without_email(fixture: &Fixture) -> ApplicationId {
    let draft = ApplicationDraft {
        applicant_full_name: Some("Ada Lovelace".to_string()),
        previous_applications: Some(1),
        number_of_employees: Some(EmployeeBand::TenToFortyNine),
        turnover_greater_than_threshold: Some(false),
        event_committed: Some(false),
        ..ApplicationDraft::default()
    };
    let mut application = Application::from_draft(draft, chrono::Utc::now());
    application.sent_for_review = true;
    let stored = fixture
        .applications
        .insert(application)
        .expect("insert application");
    stored.id
}

pub(super) fn active_task(fixture: &Fixture, process: &ProcessId, step: &str) -> Task {
    fixture
        .engine
        .list_active_tasks(process)
        .expect("list tasks")
        .into_iter()
        .find(|task| task.step == step)
        .unwrap_or_else(|| panic!("no active task for step {step}"))
}

/// Claim and complete one human step as the default reviewer.
pub(super) fn complete_step(
    fixture: &Fixture,
    process: &ProcessId,
    step: &str,
    payload: Value,
) -> crate::workflows::grant::process::domain::Process {
    let task = active_task(fixture, process, step);
    fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("claim task");
    fixture
        .engine
        .complete_task(&task.id, payload)
        .expect("complete task")
}

pub(super) fn confirm() -> Value {
    json!({ "outcome": "confirm" })
}

pub(super) fn score(score: u8) -> Value {
    json!({ "score": score, "justification": "assessed against the event brief" })
}
