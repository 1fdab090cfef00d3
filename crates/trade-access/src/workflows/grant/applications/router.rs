use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationPatch, StateAidDraft, StateAidId, StateAidPatch,
    SummaryBlock,
};
use super::repository::{ApplicationFilter, ApplicationRepository, RepositoryError};
use super::service::{ApplicationService, ApplicationServiceError};
use crate::workflows::grant::notify::NotifyGateway;
use crate::workflows::grant::pagination::paginate;
use crate::workflows::grant::process::engine::{ProcessError, WorkflowEngine};
use crate::workflows::grant::process::repository::ProcessRepository;

/// Shared state for the application endpoints: the store for applicant
/// mutations and the engine for the submission hand-off.
pub struct ApplicationRouterState<A, P, G> {
    pub service: Arc<ApplicationService<A>>,
    pub engine: Arc<WorkflowEngine<A, P, G>>,
}

impl<A, P, G> Clone for ApplicationRouterState<A, P, G> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            engine: self.engine.clone(),
        }
    }
}

/// Router builder exposing the applicant aggregate and its state-aid
/// children to the back office.
pub fn application_router<A, P, G>(state: ApplicationRouterState<A, P, G>) -> Router
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    Router::new()
        .route(
            "/grant-applications",
            get(list_applications::<A, P, G>).post(create_application::<A, P, G>),
        )
        .route(
            "/grant-applications/:application_id",
            get(get_application::<A, P, G>).patch(patch_application::<A, P, G>),
        )
        .route(
            "/grant-applications/:application_id/send-for-review",
            post(send_for_review::<A, P, G>),
        )
        .route(
            "/grant-applications/:application_id/send-resume-link",
            post(send_resume_link::<A, P, G>),
        )
        .route(
            "/state-aid",
            get(list_state_aid::<A, P, G>).post(create_state_aid::<A, P, G>),
        )
        .route(
            "/state-aid/:state_aid_id",
            axum::routing::patch(patch_state_aid::<A, P, G>)
                .delete(delete_state_aid::<A, P, G>),
        )
        .route(
            "/state-aid/:state_aid_id/duplicate",
            post(duplicate_state_aid::<A, P, G>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<usize>,
    sent_for_review: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SendForReviewBody {
    application_summary: Vec<SummaryBlock>,
}

#[derive(Debug, Deserialize)]
struct StateAidListQuery {
    grant_application: Uuid,
    page: Option<usize>,
}

async fn create_application<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    axum::Json(draft): axum::Json<ApplicationDraft>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.service.create(draft) {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(error) => service_error_response(error),
    }
}

async fn list_applications<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    let filter = ApplicationFilter {
        sent_for_review: query.sent_for_review,
        active_only: false,
    };
    match state.service.list(&filter) {
        Ok(applications) => axum::Json(paginate(applications, query.page)).into_response(),
        Err(error) => service_error_response(error),
    }
}

async fn get_application<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Path(application_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.service.get(&ApplicationId(application_id)) {
        Ok(application) => axum::Json(application).into_response(),
        Err(error) => service_error_response(error),
    }
}

async fn patch_application<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Path(application_id): Path<Uuid>,
    axum::Json(patch): axum::Json<ApplicationPatch>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    let id = ApplicationId(application_id);
    match state.service.update(&id, patch) {
        Ok(application) => axum::Json(application).into_response(),
        Err(error) => service_error_response(error),
    }
}

/// Freeze the application, then start (or rejoin) its review process. The
/// engine's start is idempotent so resubmitting the form is harmless.
async fn send_for_review<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Path(application_id): Path<Uuid>,
    axum::Json(body): axum::Json<SendForReviewBody>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    let id = ApplicationId(application_id);

    let application = match state.service.get(&id) {
        Ok(application) => application,
        Err(error) => return service_error_response(error),
    };
    if !application.is_eligible() {
        let payload = json!({ "detail": "application-ineligible" });
        return (StatusCode::CONFLICT, axum::Json(payload)).into_response();
    }

    if let Err(error) = state.service.freeze(&id, body.application_summary) {
        return service_error_response(error);
    }

    match state.engine.start(&id) {
        Ok(process) => (StatusCode::OK, axum::Json(process)).into_response(),
        Err(error) => process_error_response(error),
    }
}

/// Issue a resume magic-link and email it to the applicant. This is an
/// explicit reviewer action, used when an applicant abandons a draft.
async fn send_resume_link<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Path(application_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    let id = ApplicationId(application_id);
    match state.engine.send_resume_link(&id) {
        Ok(()) => (StatusCode::ACCEPTED, axum::Json(json!({ "status": "sent" }))).into_response(),
        Err(error) => process_error_response(error),
    }
}

async fn list_state_aid<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Query(query): Query<StateAidListQuery>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    let application = ApplicationId(query.grant_application);
    match state.service.list_state_aid(&application) {
        Ok(records) => axum::Json(paginate(records, query.page)).into_response(),
        Err(error) => service_error_response(error),
    }
}

async fn create_state_aid<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    axum::Json(draft): axum::Json<StateAidDraft>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.service.attach_state_aid(draft) {
        Ok(aid) => (StatusCode::CREATED, axum::Json(aid)).into_response(),
        Err(error) => service_error_response(error),
    }
}

async fn patch_state_aid<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Path(state_aid_id): Path<Uuid>,
    axum::Json(patch): axum::Json<StateAidPatch>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.service.update_state_aid(&StateAidId(state_aid_id), patch) {
        Ok(aid) => axum::Json(aid).into_response(),
        Err(error) => service_error_response(error),
    }
}

async fn delete_state_aid<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Path(state_aid_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.service.delete_state_aid(&StateAidId(state_aid_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => service_error_response(error),
    }
}

async fn duplicate_state_aid<A, P, G>(
    State(state): State<ApplicationRouterState<A, P, G>>,
    Path(state_aid_id): Path<Uuid>,
) -> Response
where
    A: ApplicationRepository + 'static,
    P: ProcessRepository + 'static,
    G: NotifyGateway + 'static,
{
    match state.service.duplicate_state_aid(&StateAidId(state_aid_id)) {
        Ok(aid) => (StatusCode::CREATED, axum::Json(aid)).into_response(),
        Err(error) => service_error_response(error),
    }
}

fn service_error_response(error: ApplicationServiceError) -> Response {
    let (status, payload) = match &error {
        ApplicationServiceError::NotFound(_) | ApplicationServiceError::StateAidNotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": error.to_string() }))
        }
        ApplicationServiceError::Frozen(_) => {
            (StatusCode::CONFLICT, json!({ "error": error.to_string() }))
        }
        ApplicationServiceError::Inactive(_) => {
            (StatusCode::GONE, json!({ "detail": "application-ineligible" }))
        }
        ApplicationServiceError::Invariant(violation) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": violation.to_string() }),
        ),
        ApplicationServiceError::Repository(RepositoryError::Conflict) => {
            (StatusCode::CONFLICT, json!({ "error": error.to_string() }))
        }
        ApplicationServiceError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}

fn process_error_response(error: ProcessError) -> Response {
    let status = match &error {
        ProcessError::ApplicationNotFound(_) | ProcessError::ProcessNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ProcessError::ApplicationNotSubmitted(_)
        | ProcessError::DuplicateProcess(_)
        | ProcessError::MissingApplicantEmail(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
