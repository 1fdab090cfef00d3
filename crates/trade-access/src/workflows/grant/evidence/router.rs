use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::store::{ArtifactId, ArtifactRepository, EvidenceError, EvidenceEvents, EvidenceStore};
use super::token::TokenError;
use crate::workflows::grant::applications::ApplicationId;

/// Router builder for the applicant-facing upload endpoint and the back
/// office artifact listing.
pub fn evidence_router<R, E>(store: Arc<EvidenceStore<R, E>>) -> Router
where
    R: ArtifactRepository + 'static,
    E: EvidenceEvents + 'static,
{
    Router::new()
        .route("/evidence/:token", post(upload_evidence::<R, E>))
        .route(
            "/evidence/artifacts/:artifact_id",
            get(fetch_evidence::<R, E>),
        )
        .route(
            "/grant-applications/:application_id/evidence",
            get(list_evidence::<R, E>),
        )
        .with_state(store)
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    mime_type: String,
    content_base64: String,
}

async fn upload_evidence<R, E>(
    State(store): State<Arc<EvidenceStore<R, E>>>,
    Path(token): Path<String>,
    axum::Json(body): axum::Json<UploadBody>,
) -> Response
where
    R: ArtifactRepository + 'static,
    E: EvidenceEvents + 'static,
{
    let content = match STANDARD.decode(body.content_base64.as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => {
            let payload = json!({ "error": "content_base64 is not valid base64" });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    };

    match store.upload(&token, body.mime_type, content) {
        Ok(artifact) => (StatusCode::CREATED, axum::Json(artifact)).into_response(),
        Err(error) => evidence_error_response(error),
    }
}

async fn fetch_evidence<R, E>(
    State(store): State<Arc<EvidenceStore<R, E>>>,
    Path(artifact_id): Path<Uuid>,
) -> Response
where
    R: ArtifactRepository + 'static,
    E: EvidenceEvents + 'static,
{
    match store.fetch(&ArtifactId(artifact_id)) {
        Ok(artifact) => (
            [(axum::http::header::CONTENT_TYPE, artifact.mime_type)],
            artifact.content,
        )
            .into_response(),
        Err(error) => evidence_error_response(error),
    }
}

async fn list_evidence<R, E>(
    State(store): State<Arc<EvidenceStore<R, E>>>,
    Path(application_id): Path<Uuid>,
) -> Response
where
    R: ArtifactRepository + 'static,
    E: EvidenceEvents + 'static,
{
    match store.artifacts_for(&ApplicationId(application_id)) {
        Ok(artifacts) => axum::Json(artifacts).into_response(),
        Err(error) => evidence_error_response(error),
    }
}

fn evidence_error_response(error: EvidenceError) -> Response {
    let (status, payload) = match &error {
        EvidenceError::Token(TokenError::Invalid) | EvidenceError::WrongAction => {
            (StatusCode::FORBIDDEN, json!({ "detail": "invalid-token" }))
        }
        EvidenceError::Token(TokenError::Expired) => {
            (StatusCode::GONE, json!({ "detail": "expired-token" }))
        }
        EvidenceError::NotAwaitingEvidence(_) => {
            (StatusCode::CONFLICT, json!({ "error": error.to_string() }))
        }
        EvidenceError::ArtifactNotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": error.to_string() }))
        }
        EvidenceError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}
