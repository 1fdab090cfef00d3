use std::collections::HashMap;

use serde::Serialize;

use super::domain::{Process, ProcessId, Task, TaskId, TransitionRecord};
use crate::workflows::grant::applications::{ApplicationId, RepositoryError};

/// A process row together with everything it owns: its tasks, the
/// outstanding join barriers, and the audit trail. Persisted and replaced
/// as one unit so a transition commits atomically.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    pub process: Process,
    pub tasks: Vec<Task>,
    /// Join name to the step names still outstanding before it fires.
    pub barriers: HashMap<String, Vec<String>>,
    pub audit: Vec<TransitionRecord>,
}

impl ProcessRecord {
    pub(crate) fn new(process: Process) -> Self {
        Self {
            process,
            tasks: Vec::new(),
            barriers: HashMap::new(),
            audit: Vec::new(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == *id)
    }

    pub(crate) fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == *id)
    }

    pub fn active_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| task.is_active())
            .cloned()
            .collect()
    }
}

/// Persistence for process records.
///
/// `create` must reject a second record for the same application with
/// [`RepositoryError::Conflict`]; the engine relies on that to keep process
/// creation race-free.
pub trait ProcessRepository: Send + Sync {
    fn create(&self, record: ProcessRecord) -> Result<ProcessRecord, RepositoryError>;
    fn fetch(&self, id: &ProcessId) -> Result<Option<ProcessRecord>, RepositoryError>;
    fn find_by_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<ProcessRecord>, RepositoryError>;
    fn find_by_task(&self, task: &TaskId) -> Result<Option<ProcessRecord>, RepositoryError>;
    fn update(&self, record: ProcessRecord) -> Result<(), RepositoryError>;
}
