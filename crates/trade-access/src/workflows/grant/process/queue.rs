//! Task claiming and completion rules.
//!
//! The helpers here are pure mutations on a [`ProcessRecord`]; the engine
//! calls them while holding the process lock, which is what turns claim
//! into a compare-and-set and serialises concurrent completions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::domain::{Process, ProcessId, Task, TaskId, TaskKind};
use super::engine::{ProcessError, WorkflowEngine};
use super::repository::{ProcessRecord, ProcessRepository};
use super::schema::{step_schema, SchemaViolation};
use crate::workflows::grant::applications::ApplicationRepository;
use crate::workflows::grant::notify::NotifyGateway;

/// Rejections raised by the assignment rules.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("task {task} is already claimed by {assignee}")]
    AlreadyClaimed { task: TaskId, assignee: String },
    #[error("task {0} must be claimed before completion")]
    Unassigned(TaskId),
    #[error("task {0} is closed")]
    Closed(TaskId),
    #[error("task {0} does not accept reviewer actions")]
    NotHuman(TaskId),
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}

fn human_task<'a>(record: &'a mut ProcessRecord, id: &TaskId) -> Result<&'a mut Task, TaskError> {
    let task = record.task_mut(id).ok_or(TaskError::NotFound(*id))?;
    if task.kind != TaskKind::Human {
        return Err(TaskError::NotHuman(*id));
    }
    if task.finished_at.is_some() {
        return Err(TaskError::Closed(*id));
    }
    Ok(task)
}

/// Compare-and-set on `assigned_reviewer` from empty to the claimant.
pub(crate) fn claim(
    record: &mut ProcessRecord,
    id: &TaskId,
    reviewer: &str,
) -> Result<Task, TaskError> {
    let task = human_task(record, id)?;
    if let Some(assignee) = &task.assigned_reviewer {
        if assignee != reviewer {
            return Err(TaskError::AlreadyClaimed {
                task: *id,
                assignee: assignee.clone(),
            });
        }
        return Ok(task.clone());
    }
    task.assigned_reviewer = Some(reviewer.to_string());
    Ok(task.clone())
}

pub(crate) fn release(record: &mut ProcessRecord, id: &TaskId) -> Result<Task, TaskError> {
    let task = human_task(record, id)?;
    task.assigned_reviewer = None;
    Ok(task.clone())
}

/// Administrator reassignment. Returns the prior assignee for the audit
/// trail.
pub(crate) fn reassign(
    record: &mut ProcessRecord,
    id: &TaskId,
    reviewer: &str,
) -> Result<(Task, Option<String>), TaskError> {
    let task = human_task(record, id)?;
    let prior = task.assigned_reviewer.replace(reviewer.to_string());
    Ok((task.clone(), prior))
}

/// Validate the payload, record it, and close the task. Returns the step
/// name so the engine can merge the payload and fire successors.
pub(crate) fn complete(
    record: &mut ProcessRecord,
    id: &TaskId,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<String, TaskError> {
    let task = human_task(record, id)?;
    if task.assigned_reviewer.is_none() {
        return Err(TaskError::Unassigned(*id));
    }
    if let Some(schema) = step_schema(&task.step) {
        schema.validate(payload)?;
    }
    task.payload = Some(payload.clone());
    task.finished_at = Some(now);
    Ok(task.step.clone())
}

/// Reviewer-facing facade over the engine's task operations.
pub struct TaskQueue<A, P, G> {
    engine: Arc<WorkflowEngine<A, P, G>>,
}

impl<A, P, G> Clone for TaskQueue<A, P, G> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<A, P, G> TaskQueue<A, P, G>
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    pub fn new(engine: Arc<WorkflowEngine<A, P, G>>) -> Self {
        Self { engine }
    }

    pub fn list_active(&self, process: &ProcessId) -> Result<Vec<Task>, ProcessError> {
        self.engine.list_active_tasks(process)
    }

    pub fn claim(&self, task: &TaskId, reviewer: &str) -> Result<Task, ProcessError> {
        self.engine.claim_task(task, reviewer)
    }

    pub fn release(&self, task: &TaskId) -> Result<Task, ProcessError> {
        self.engine.release_task(task)
    }

    pub fn reassign(&self, task: &TaskId, reviewer: &str) -> Result<Task, ProcessError> {
        self.engine.reassign_task(task, reviewer)
    }

    pub fn complete(&self, task: &TaskId, payload: Value) -> Result<Process, ProcessError> {
        self.engine.complete_task(task, payload)
    }
}
