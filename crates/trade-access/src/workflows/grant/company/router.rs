use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{CompanyId, CompanyPayload};
use super::gateway::CompanyDataGateway;
use super::repository::CompanyRepository;
use super::service::{CompanyService, CompanyServiceError};
use crate::workflows::grant::pagination::paginate;

/// Router builder for the company cache endpoints.
pub fn company_router<R, G>(service: Arc<CompanyService<R, G>>) -> Router
where
    R: CompanyRepository + 'static,
    G: CompanyDataGateway + 'static,
{
    Router::new()
        .route(
            "/companies",
            get(list_companies::<R, G>).post(register_company::<R, G>),
        )
        .route("/companies/search", get(search_companies::<R, G>))
        .route("/companies/:company_id", get(get_company::<R, G>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search_term: Option<String>,
    duns_number: Option<String>,
}

async fn list_companies<R, G>(
    State(service): State<Arc<CompanyService<R, G>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: CompanyRepository + 'static,
    G: CompanyDataGateway + 'static,
{
    match service.list() {
        Ok(companies) => axum::Json(paginate(companies, query.page)).into_response(),
        Err(error) => company_error_response(error),
    }
}

async fn register_company<R, G>(
    State(service): State<Arc<CompanyService<R, G>>>,
    axum::Json(payload): axum::Json<CompanyPayload>,
) -> Response
where
    R: CompanyRepository + 'static,
    G: CompanyDataGateway + 'static,
{
    match service.register(payload) {
        Ok(company) => (StatusCode::CREATED, axum::Json(company)).into_response(),
        Err(error) => company_error_response(error),
    }
}

async fn get_company<R, G>(
    State(service): State<Arc<CompanyService<R, G>>>,
    Path(company_id): Path<Uuid>,
) -> Response
where
    R: CompanyRepository + 'static,
    G: CompanyDataGateway + 'static,
{
    match service.get_company(&CompanyId(company_id)) {
        Ok(view) => axum::Json(view).into_response(),
        Err(error) => company_error_response(error),
    }
}

/// Search the provider by free text or DUNS number. At least one of the
/// two parameters is required.
async fn search_companies<R, G>(
    State(service): State<Arc<CompanyService<R, G>>>,
    Query(query): Query<SearchQuery>,
) -> Response
where
    R: CompanyRepository + 'static,
    G: CompanyDataGateway + 'static,
{
    let result = match (&query.search_term, &query.duns_number) {
        (Some(term), _) => service.search_by_term(term),
        (None, Some(duns_number)) => service.search_by_duns(duns_number),
        (None, None) => {
            let payload = json!({
                "non_field_errors": "One of search_term or duns_number required."
            });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };
    match result {
        Ok(companies) => axum::Json(companies).into_response(),
        Err(error) => company_error_response(error),
    }
}

fn company_error_response(error: CompanyServiceError) -> Response {
    let (status, payload) = match &error {
        CompanyServiceError::NotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": error.to_string() }))
        }
        CompanyServiceError::Upstream(upstream) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "detail": upstream.to_string() }),
        ),
        CompanyServiceError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}
