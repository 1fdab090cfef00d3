//! The review workflow engine.
//!
//! All mutation of a process goes through one transition at a time: the
//! engine takes a per-process lock, applies the change to the record,
//! commits it, and only then runs the notification side-effects the
//! transition collected. A failed email therefore never unwinds a
//! committed state change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{
    Decision, Process, ProcessId, ProcessStatus, SuitabilityScore, Task, TaskId, TaskKind,
    TransitionRecord, VerificationFlag,
};
use super::graph::{self, StepDescriptor};
use super::queue::{self, TaskError};
use super::repository::{ProcessRecord, ProcessRepository};
use crate::workflows::grant::applications::{
    Application, ApplicationId, ApplicationRepository, RepositoryError,
};
use crate::workflows::grant::evidence::{
    ActionType, EvidenceError, EvidenceEvents, MagicLinkIssuer,
};
use crate::workflows::grant::notify::{NotificationDispatcher, NotifyGateway};

/// Evidence rejection cycles allowed before the process auto-rejects.
const MAX_EVIDENCE_CYCLES: u8 = 3;

const EVIDENCE_EXHAUSTED: &str = "evidence-exhausted";

/// Errors raised by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("application {0} has not been sent for review")]
    ApplicationNotSubmitted(ApplicationId),
    #[error("process {0} not found")]
    ProcessNotFound(ProcessId),
    #[error("application {0} already has a review process")]
    DuplicateProcess(ApplicationId),
    #[error("application {0} is not awaiting evidence")]
    NotAwaitingEvidence(ApplicationId),
    #[error("application {0} has no applicant email on file")]
    MissingApplicantEmail(ApplicationId),
    #[error("step '{0}' is not part of the review flow")]
    UnknownStep(String),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Notification work collected during a transition, executed after commit
/// in the order the handlers ran.
enum SideEffect {
    SubmittedEmail,
    EvidenceRequestEmail { magic_link: String },
    UploadConfirmationEmail,
    EvidenceApprovedEmail,
    EvidenceRejectedEmail,
    DecisionEmail { approved: bool },
}

pub struct WorkflowEngine<A, P, G> {
    applications: Arc<A>,
    repository: Arc<P>,
    dispatcher: Arc<NotificationDispatcher<G>>,
    issuer: MagicLinkIssuer,
    locks: Mutex<HashMap<ProcessId, Arc<Mutex<()>>>>,
}

impl<A, P, G> WorkflowEngine<A, P, G>
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    pub fn new(
        applications: Arc<A>,
        repository: Arc<P>,
        dispatcher: Arc<NotificationDispatcher<G>>,
        issuer: MagicLinkIssuer,
    ) -> Self {
        Self {
            applications,
            repository,
            dispatcher,
            issuer,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Start the review process for a submitted application. Starting twice
    /// returns the existing process unchanged.
    pub fn start(&self, application_id: &ApplicationId) -> Result<Process, ProcessError> {
        let application = self.load_application(application_id)?;
        if !application.sent_for_review {
            return Err(ProcessError::ApplicationNotSubmitted(*application_id));
        }
        if let Some(existing) = self.repository.find_by_application(application_id)? {
            return Ok(existing.process);
        }

        let now = Utc::now();
        let mut record = ProcessRecord::new(Process::new(*application_id, now));
        let mut effects = Vec::new();
        self.activate(&mut record, &application, graph::START, now, &mut effects)?;

        let record = self.repository.create(record).map_err(|error| match error {
            RepositoryError::Conflict => ProcessError::DuplicateProcess(*application_id),
            other => ProcessError::Repository(other),
        })?;
        info!(process = %record.process.id, application = %application_id, "review process started");

        self.run_effects(&application, &record.process, effects);
        Ok(record.process)
    }

    pub fn get_record(&self, process: &ProcessId) -> Result<ProcessRecord, ProcessError> {
        self.repository
            .fetch(process)?
            .ok_or(ProcessError::ProcessNotFound(*process))
    }

    pub fn record_for_application(
        &self,
        application: &ApplicationId,
    ) -> Result<ProcessRecord, ProcessError> {
        self.repository
            .find_by_application(application)?
            .ok_or(ProcessError::ApplicationNotFound(*application))
    }

    pub fn list_active_tasks(&self, process: &ProcessId) -> Result<Vec<Task>, ProcessError> {
        Ok(self.get_record(process)?.active_tasks())
    }

    pub fn claim_task(&self, task: &TaskId, reviewer: &str) -> Result<Task, ProcessError> {
        self.with_task_record(task, |record, now| {
            let claimed = queue::claim(record, task, reviewer)?;
            record.audit.push(TransitionRecord::new(
                &claimed.step,
                format!("claimed by {reviewer}"),
                now,
            ));
            Ok(claimed)
        })
    }

    pub fn release_task(&self, task: &TaskId) -> Result<Task, ProcessError> {
        self.with_task_record(task, |record, now| {
            let released = queue::release(record, task)?;
            record
                .audit
                .push(TransitionRecord::new(&released.step, "released", now));
            Ok(released)
        })
    }

    /// Administrator reassignment; the prior assignee is kept in the audit
    /// trail.
    pub fn reassign_task(&self, task: &TaskId, reviewer: &str) -> Result<Task, ProcessError> {
        self.with_task_record(task, |record, now| {
            let (reassigned, prior) = queue::reassign(record, task, reviewer)?;
            let detail = match prior {
                Some(prior) => format!("reassigned from {prior} to {reviewer}"),
                None => format!("assigned to {reviewer}"),
            };
            record
                .audit
                .push(TransitionRecord::new(&reassigned.step, detail, now));
            Ok(reassigned)
        })
    }

    /// Complete a human task: validate and merge the payload, then fire the
    /// step's successors (or tick its join barrier).
    pub fn complete_task(&self, task: &TaskId, payload: Value) -> Result<Process, ProcessError> {
        let process_id = self.process_for_task(task)?;
        let lock = self.lock_for(process_id);
        let _guard = lock.lock().expect("process lock poisoned");

        let mut record = self.get_record(&process_id)?;
        let application = self.load_application(&record.process.application)?;
        let now = Utc::now();
        let mut effects = Vec::new();

        let step = queue::complete(&mut record, task, &payload, now)?;
        record
            .audit
            .push(TransitionRecord::new(&step, "completed", now));
        apply_payload(&mut record.process, &step, &payload);
        record.process.updated_at = now;

        let descriptor =
            graph::step(&step).ok_or_else(|| ProcessError::UnknownStep(step.clone()))?;
        self.fire_successors(&mut record, &application, descriptor, now, &mut effects)?;

        let process = record.process.clone();
        self.repository.update(record)?;
        drop(_guard);

        self.run_effects(&application, &process, effects);
        Ok(process)
    }

    /// Issue a fresh resume magic-link and mail it to the applicant.
    pub fn send_resume_link(&self, application_id: &ApplicationId) -> Result<(), ProcessError> {
        let application = self.load_application(application_id)?;
        let Some(recipient) = application.applicant_email.as_deref() else {
            return Err(ProcessError::MissingApplicantEmail(*application_id));
        };
        let link = self
            .issuer
            .magic_link(application_id, ActionType::ResumeApplication);
        self.dispatcher.application_resume(
            recipient,
            application.applicant_full_name.as_deref().unwrap_or_default(),
            application_id,
            &link,
        );
        Ok(())
    }

    /// Read-only check: does the review process have an armed
    /// `review-evidence` function step waiting on an upload?
    pub fn awaiting_evidence(&self, application_id: &ApplicationId) -> Result<(), ProcessError> {
        let record = self
            .repository
            .find_by_application(application_id)?
            .ok_or(ProcessError::NotAwaitingEvidence(*application_id))?;
        let armed = record.tasks.iter().any(|task| {
            task.kind == TaskKind::Function
                && task.step == graph::REVIEW_EVIDENCE
                && task.is_active()
        });
        if armed {
            Ok(())
        } else {
            Err(ProcessError::NotAwaitingEvidence(*application_id))
        }
    }

    /// External trigger: the applicant uploaded evidence. Advances the
    /// armed `review-evidence` function step.
    pub fn evidence_uploaded(&self, application_id: &ApplicationId) -> Result<(), ProcessError> {
        let record = self
            .repository
            .find_by_application(application_id)?
            .ok_or(ProcessError::NotAwaitingEvidence(*application_id))?;
        let process_id = record.process.id;

        let lock = self.lock_for(process_id);
        let _guard = lock.lock().expect("process lock poisoned");

        let mut record = self.get_record(&process_id)?;
        let application = self.load_application(application_id)?;
        let now = Utc::now();
        let mut effects = Vec::new();

        let task_id = record
            .tasks
            .iter()
            .find(|task| {
                task.kind == TaskKind::Function
                    && task.step == graph::REVIEW_EVIDENCE
                    && task.is_active()
            })
            .map(|task| task.id)
            .ok_or(ProcessError::NotAwaitingEvidence(*application_id))?;

        if let Some(task) = record.task_mut(&task_id) {
            task.finished_at = Some(now);
        }
        record.process.event_evidence_uploaded = true;
        record.process.updated_at = now;
        record.audit.push(TransitionRecord::new(
            graph::REVIEW_EVIDENCE,
            "evidence uploaded",
            now,
        ));
        effects.push(SideEffect::UploadConfirmationEmail);

        let descriptor = graph::step(graph::REVIEW_EVIDENCE)
            .ok_or_else(|| ProcessError::UnknownStep(graph::REVIEW_EVIDENCE.to_string()))?;
        self.fire_successors(&mut record, &application, descriptor, now, &mut effects)?;

        let process = record.process.clone();
        self.repository.update(record)?;
        drop(_guard);

        self.run_effects(&application, &process, effects);
        Ok(())
    }

    fn process_for_task(&self, task: &TaskId) -> Result<ProcessId, ProcessError> {
        Ok(self
            .repository
            .find_by_task(task)?
            .ok_or(TaskError::NotFound(*task))?
            .process
            .id)
    }

    /// Run a short mutation against the record owning `task`, under the
    /// process lock.
    fn with_task_record<T>(
        &self,
        task: &TaskId,
        mutate: impl FnOnce(&mut ProcessRecord, DateTime<Utc>) -> Result<T, ProcessError>,
    ) -> Result<T, ProcessError> {
        let process_id = self.process_for_task(task)?;
        let lock = self.lock_for(process_id);
        let _guard = lock.lock().expect("process lock poisoned");

        let mut record = self.get_record(&process_id)?;
        let now = Utc::now();
        let value = mutate(&mut record, now)?;
        record.process.updated_at = now;
        self.repository.update(record)?;
        Ok(value)
    }

    fn lock_for(&self, process: ProcessId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks.entry(process).or_default().clone()
    }

    fn load_application(&self, id: &ApplicationId) -> Result<Application, ProcessError> {
        self.applications
            .fetch(id)?
            .ok_or(ProcessError::ApplicationNotFound(*id))
    }

    /// Activate a step. Handlers, splits, joins, start and end run to
    /// completion immediately, cascading into their successors; human and
    /// function steps leave an open task behind.
    fn activate(
        &self,
        record: &mut ProcessRecord,
        application: &Application,
        step_name: &str,
        now: DateTime<Utc>,
        effects: &mut Vec<SideEffect>,
    ) -> Result<(), ProcessError> {
        let descriptor = graph::step(step_name)
            .ok_or_else(|| ProcessError::UnknownStep(step_name.to_string()))?;
        record
            .audit
            .push(TransitionRecord::new(step_name, "activated", now));

        match descriptor.kind {
            TaskKind::Human | TaskKind::Function => {
                record
                    .tasks
                    .push(Task::open(record.process.id, step_name, descriptor.kind, now));
            }
            TaskKind::Start | TaskKind::Join => {
                record.tasks.push(Task::closed(
                    record.process.id,
                    step_name,
                    descriptor.kind,
                    now,
                ));
                for successor in descriptor.successors {
                    self.activate(record, application, successor, now, effects)?;
                }
            }
            TaskKind::Split => {
                record.tasks.push(Task::closed(
                    record.process.id,
                    step_name,
                    descriptor.kind,
                    now,
                ));
                if let Some(join) = descriptor.barrier {
                    record.barriers.insert(
                        join.to_string(),
                        descriptor
                            .successors
                            .iter()
                            .map(|step| step.to_string())
                            .collect(),
                    );
                }
                for successor in descriptor.successors {
                    self.activate(record, application, successor, now, effects)?;
                }
            }
            TaskKind::Handler => {
                record.tasks.push(Task::closed(
                    record.process.id,
                    step_name,
                    descriptor.kind,
                    now,
                ));
                let successors = self.run_handler(record, application, step_name, effects)?;
                for successor in successors {
                    self.activate(record, application, successor, now, effects)?;
                }
            }
            TaskKind::End => {
                record.tasks.push(Task::closed(
                    record.process.id,
                    step_name,
                    descriptor.kind,
                    now,
                ));
                record.process.status = ProcessStatus::Finished;
                record.process.finished_at = Some(now);
            }
        }
        record.process.updated_at = now;
        Ok(())
    }

    /// After a task finishes: tick the join barrier it reports to, or
    /// activate its static successors.
    fn fire_successors(
        &self,
        record: &mut ProcessRecord,
        application: &Application,
        descriptor: &StepDescriptor,
        now: DateTime<Utc>,
        effects: &mut Vec<SideEffect>,
    ) -> Result<(), ProcessError> {
        if let Some(join) = descriptor.barrier {
            let fired = match record.barriers.get_mut(join) {
                Some(outstanding) => {
                    outstanding.retain(|step| step != descriptor.name);
                    outstanding.is_empty()
                }
                None => false,
            };
            if fired {
                record.barriers.remove(join);
                self.activate(record, application, join, now, effects)?;
            }
            return Ok(());
        }
        for successor in descriptor.successors {
            self.activate(record, application, successor, now, effects)?;
        }
        Ok(())
    }

    /// Synchronous handler side-effects. Returns the successors to
    /// activate; `send-evidence-decision-email` is the one handler whose
    /// continuation depends on process state.
    fn run_handler(
        &self,
        record: &mut ProcessRecord,
        application: &Application,
        step_name: &str,
        effects: &mut Vec<SideEffect>,
    ) -> Result<Vec<&'static str>, ProcessError> {
        match step_name {
            graph::SEND_SUBMITTED_EMAIL => {
                effects.push(SideEffect::SubmittedEmail);
                Ok(vec![graph::VERIFY_SPLIT])
            }
            graph::SEND_EVIDENCE_REQUEST => {
                record.process.event_evidence_requested = true;
                record.process.event_evidence_uploaded = false;
                let magic_link = self
                    .issuer
                    .magic_link(&application.id, ActionType::UploadEventEvidence);
                effects.push(SideEffect::EvidenceRequestEmail { magic_link });
                Ok(vec![graph::REVIEW_EVIDENCE])
            }
            graph::SEND_EVIDENCE_DECISION_EMAIL => {
                if record.process.event_evidence_approved {
                    effects.push(SideEffect::EvidenceApprovedEmail);
                    Ok(vec![graph::SUITABILITY_SPLIT])
                } else {
                    effects.push(SideEffect::EvidenceRejectedEmail);
                    if record.process.evidence_renewal_cycles >= MAX_EVIDENCE_CYCLES {
                        record.process.decision = Decision::Rejected;
                        record.process.decision_reason = Some(EVIDENCE_EXHAUSTED.to_string());
                        effects.push(SideEffect::DecisionEmail { approved: false });
                        Ok(vec![graph::END])
                    } else {
                        Ok(vec![graph::SEND_EVIDENCE_REQUEST])
                    }
                }
            }
            graph::SEND_DECISION_EMAIL => {
                effects.push(SideEffect::DecisionEmail {
                    approved: record.process.is_approved(),
                });
                Ok(vec![graph::END])
            }
            other => Err(ProcessError::UnknownStep(other.to_string())),
        }
    }

    fn run_effects(&self, application: &Application, process: &Process, effects: Vec<SideEffect>) {
        let Some(recipient) = application.applicant_email.as_deref() else {
            if !effects.is_empty() {
                warn!(
                    application = %process.application,
                    "no applicant email on file, skipping notifications"
                );
            }
            return;
        };
        let name = application.applicant_full_name.as_deref().unwrap_or_default();
        let id = &process.application;

        for effect in effects {
            match effect {
                SideEffect::SubmittedEmail => {
                    self.dispatcher.application_submitted(recipient, name, id);
                }
                SideEffect::EvidenceRequestEmail { magic_link } => {
                    self.dispatcher
                        .event_booking_evidence(recipient, name, id, &magic_link);
                }
                SideEffect::UploadConfirmationEmail => {
                    self.dispatcher
                        .event_evidence_upload_confirmation(recipient, name, id);
                }
                SideEffect::EvidenceApprovedEmail => {
                    self.dispatcher
                        .event_booking_document_approved(recipient, name, id);
                }
                SideEffect::EvidenceRejectedEmail => {
                    self.dispatcher
                        .event_booking_document_rejected(recipient, name, id);
                }
                SideEffect::DecisionEmail { approved } => {
                    if approved {
                        self.dispatcher.application_approved(recipient, name, id);
                    } else {
                        self.dispatcher.application_rejected(recipient, name, id);
                    }
                }
            }
        }
    }
}

/// Merge a validated completion payload into the process fields.
fn apply_payload(process: &mut Process, step: &str, payload: &Value) {
    let outcome = payload.get("outcome").and_then(Value::as_str);
    match step {
        graph::VERIFY_PREVIOUS_APPLICATIONS => {
            process.previous_applications_verified = verification(outcome);
        }
        graph::VERIFY_EVENT_COMMITMENT => {
            process.event_commitment_verified = verification(outcome);
        }
        graph::VERIFY_BUSINESS_ENTITY => {
            process.business_entity_verified = verification(outcome);
        }
        graph::VERIFY_STATE_AID => {
            process.state_aid_verified = verification(outcome);
        }
        graph::RENEW_PROOF_OF_EVENT_BOOKING => {
            if outcome == Some("approve") {
                process.event_evidence_approved = true;
            } else {
                process.event_evidence_approved = false;
                process.evidence_renewal_cycles = process.evidence_renewal_cycles.saturating_add(1);
            }
        }
        graph::PRODUCTS_AND_SERVICES => {
            process.products_and_services = suitability(payload);
        }
        graph::PRODUCTS_AND_SERVICES_COMPETITORS => {
            process.products_and_services_competitors = suitability(payload);
        }
        graph::EXPORT_STRATEGY => {
            process.export_strategy = suitability(payload);
        }
        graph::EVENT_IS_APPROPRIATE => {
            process.event_is_appropriate = payload
                .get("event_is_appropriate")
                .and_then(Value::as_bool);
            process.event_appropriateness_justification = payload
                .get("justification")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        graph::DECISION => {
            process.decision = match outcome {
                Some("approved") => Decision::Approved,
                _ => Decision::Rejected,
            };
        }
        _ => {}
    }
}

fn verification(outcome: Option<&str>) -> VerificationFlag {
    match outcome {
        Some("confirm") => VerificationFlag::Confirmed,
        _ => VerificationFlag::Challenged,
    }
}

fn suitability(payload: &Value) -> Option<SuitabilityScore> {
    let score = payload.get("score").and_then(Value::as_u64)? as u8;
    let justification = payload
        .get("justification")
        .and_then(Value::as_str)?
        .to_string();
    Some(SuitabilityScore {
        score,
        justification,
    })
}

impl<A, P, G> EvidenceEvents for WorkflowEngine<A, P, G>
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    fn awaiting_evidence(&self, application: &ApplicationId) -> Result<(), EvidenceError> {
        WorkflowEngine::awaiting_evidence(self, application).map_err(|error| match error {
            ProcessError::Repository(inner) => EvidenceError::Repository(inner),
            _ => EvidenceError::NotAwaitingEvidence(*application),
        })
    }

    fn evidence_received(&self, application: &ApplicationId) -> Result<(), EvidenceError> {
        self.evidence_uploaded(application).map_err(|error| match error {
            ProcessError::Repository(inner) => EvidenceError::Repository(inner),
            _ => EvidenceError::NotAwaitingEvidence(*application),
        })
    }
}
