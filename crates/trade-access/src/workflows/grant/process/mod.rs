//! The review process: flow graph, engine, and reviewer task queue.

pub mod domain;
pub mod engine;
pub mod graph;
pub mod queue;
pub mod repository;
pub mod router;
pub mod schema;

#[cfg(test)]
mod tests;

pub use domain::{
    Decision, Process, ProcessId, ProcessStatus, SuitabilityScore, Task, TaskId, TaskKind,
    TransitionRecord, VerificationFlag,
};
pub use engine::{ProcessError, WorkflowEngine};
pub use queue::{TaskError, TaskQueue};
pub use repository::{ProcessRecord, ProcessRepository};
pub use router::{process_router, ProcessRouterState};
pub use schema::{step_schema, FieldSpec, SchemaViolation, StepSchema};
