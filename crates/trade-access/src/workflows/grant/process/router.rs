use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::domain::{ProcessId, TaskId};
use super::engine::{ProcessError, WorkflowEngine};
use super::queue::{TaskError, TaskQueue};
use super::repository::ProcessRepository;
use crate::workflows::grant::applications::{ApplicationId, ApplicationRepository};
use crate::workflows::grant::notify::NotifyGateway;

/// Shared state for the reviewer endpoints.
pub struct ProcessRouterState<A, P, G> {
    pub engine: Arc<WorkflowEngine<A, P, G>>,
    pub queue: TaskQueue<A, P, G>,
}

impl<A, P, G> Clone for ProcessRouterState<A, P, G> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            queue: self.queue.clone(),
        }
    }
}

/// Router builder for process views and the reviewer task queue.
pub fn process_router<A, P, G>(state: ProcessRouterState<A, P, G>) -> Router
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    Router::new()
        .route("/processes/:process_id", get(get_process::<A, P, G>))
        .route(
            "/processes/:process_id/tasks",
            get(list_tasks::<A, P, G>),
        )
        .route(
            "/grant-applications/:application_id/process",
            get(get_process_for_application::<A, P, G>),
        )
        .route("/tasks/:task_id/claim", post(claim_task::<A, P, G>))
        .route("/tasks/:task_id/release", post(release_task::<A, P, G>))
        .route("/tasks/:task_id/reassign", post(reassign_task::<A, P, G>))
        .route("/tasks/:task_id/complete", post(complete_task::<A, P, G>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ReviewerBody {
    reviewer: String,
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    payload: Value,
}

async fn get_process<A, P, G>(
    State(state): State<ProcessRouterState<A, P, G>>,
    Path(process_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.engine.get_record(&ProcessId(process_id)) {
        Ok(record) => axum::Json(record).into_response(),
        Err(error) => process_error_response(error),
    }
}

async fn get_process_for_application<A, P, G>(
    State(state): State<ProcessRouterState<A, P, G>>,
    Path(application_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state
        .engine
        .record_for_application(&ApplicationId(application_id))
    {
        Ok(record) => axum::Json(record).into_response(),
        Err(error) => process_error_response(error),
    }
}

async fn list_tasks<A, P, G>(
    State(state): State<ProcessRouterState<A, P, G>>,
    Path(process_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.queue.list_active(&ProcessId(process_id)) {
        Ok(tasks) => axum::Json(tasks).into_response(),
        Err(error) => process_error_response(error),
    }
}

async fn claim_task<A, P, G>(
    State(state): State<ProcessRouterState<A, P, G>>,
    Path(task_id): Path<Uuid>,
    axum::Json(body): axum::Json<ReviewerBody>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.queue.claim(&TaskId(task_id), &body.reviewer) {
        Ok(task) => axum::Json(task).into_response(),
        Err(error) => process_error_response(error),
    }
}

async fn release_task<A, P, G>(
    State(state): State<ProcessRouterState<A, P, G>>,
    Path(task_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.queue.release(&TaskId(task_id)) {
        Ok(task) => axum::Json(task).into_response(),
        Err(error) => process_error_response(error),
    }
}

async fn reassign_task<A, P, G>(
    State(state): State<ProcessRouterState<A, P, G>>,
    Path(task_id): Path<Uuid>,
    axum::Json(body): axum::Json<ReviewerBody>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.queue.reassign(&TaskId(task_id), &body.reviewer) {
        Ok(task) => axum::Json(task).into_response(),
        Err(error) => process_error_response(error),
    }
}

async fn complete_task<A, P, G>(
    State(state): State<ProcessRouterState<A, P, G>>,
    Path(task_id): Path<Uuid>,
    axum::Json(body): axum::Json<CompleteBody>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.queue.complete(&TaskId(task_id), body.payload) {
        Ok(process) => axum::Json(process).into_response(),
        Err(error) => process_error_response(error),
    }
}

fn process_error_response(error: ProcessError) -> Response {
    let status = match &error {
        ProcessError::ApplicationNotFound(_)
        | ProcessError::ProcessNotFound(_)
        | ProcessError::Task(TaskError::NotFound(_)) => StatusCode::NOT_FOUND,
        ProcessError::ApplicationNotSubmitted(_)
        | ProcessError::DuplicateProcess(_)
        | ProcessError::NotAwaitingEvidence(_)
        | ProcessError::MissingApplicantEmail(_)
        | ProcessError::Task(TaskError::AlreadyClaimed { .. })
        | ProcessError::Task(TaskError::Unassigned(_))
        | ProcessError::Task(TaskError::Closed(_))
        | ProcessError::Task(TaskError::NotHuman(_)) => StatusCode::CONFLICT,
        ProcessError::Task(TaskError::Schema(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ProcessError::UnknownStep(_) | ProcessError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
