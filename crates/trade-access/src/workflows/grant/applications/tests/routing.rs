use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{build_env, draft, read_json_body};
use crate::workflows::grant::applications::ApplicationDraft;

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialise")))
        .expect("request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    json_request(method, uri, &json!({}))
}

async fn create_application(env: &super::common::Env, draft: &ApplicationDraft) -> Value {
    let body = serde_json::to_value(serde_json::json!({
        "applicant_full_name": draft.applicant_full_name,
        "applicant_email": draft.applicant_email,
        "previous_applications": draft.previous_applications,
        "number_of_employees": "10-to-49",
        "turnover_greater_than_threshold": draft.turnover_greater_than_threshold,
        "event_committed": draft.event_committed,
    }))
    .expect("body");
    let response = env
        .router
        .clone()
        .oneshot(json_request("POST", "/grant-applications", &body))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json_body(response).await
}

#[tokio::test]
async fn create_returns_the_stored_application() {
    let env = build_env();
    let created = create_application(&env, &draft()).await;

    assert!(created.get("id").is_some());
    assert_eq!(created["sent_for_review"], json!(false));
    assert_eq!(created["is_active"], json!(true));
}

#[tokio::test]
async fn patch_moves_answer_fields_on_open_drafts() {
    let env = build_env();
    let created = create_application(&env, &draft()).await;
    let id = created["id"].as_str().expect("id");

    let response = env
        .router
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/grant-applications/{id}"),
            &json!({ "event_name": "Hannover Messe" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["event_name"], json!("Hannover Messe"));
}

#[tokio::test]
async fn send_for_review_freezes_and_starts_the_process() {
    let env = build_env();
    let created = create_application(&env, &draft()).await;
    let id = created["id"].as_str().expect("id");

    let response = env
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/grant-applications/{id}/send-for-review"),
            &json!({ "application_summary": [
                { "heading": "About you", "rows": [
                    { "key": "Name", "value": "Ada Lovelace" }
                ] }
            ] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let process = read_json_body(response).await;
    assert_eq!(process["status"], json!("active"));
    assert_eq!(env.notify.sent("application-submitted"), 1);

    // The aggregate is frozen afterwards.
    let response = env
        .router
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/grant-applications/{id}"),
            &json!({ "event_name": "Too late" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn resubmitting_returns_the_same_process() {
    let env = build_env();
    let created = create_application(&env, &draft()).await;
    let id = created["id"].as_str().expect("id");
    let submit = || {
        json_request(
            "POST",
            &format!("/grant-applications/{id}/send-for-review"),
            &json!({ "application_summary": [] }),
        )
    };

    let first = env
        .router
        .clone()
        .oneshot(submit())
        .await
        .expect("route executes");
    let first = read_json_body(first).await;

    let second = env
        .router
        .clone()
        .oneshot(submit())
        .await
        .expect("route executes");
    assert_eq!(second.status(), StatusCode::OK);
    let second = read_json_body(second).await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(env.notify.sent("application-submitted"), 1);
}

#[tokio::test]
async fn ineligible_applications_cannot_be_sent_for_review() {
    let env = build_env();
    let mut ineligible = draft();
    ineligible.previous_applications = Some(6);
    let created = env
        .service
        .create(ineligible)
        .expect("create application");

    let response = env
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/grant-applications/{}/send-for-review", created.id),
            &json!({ "application_summary": [] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["detail"], json!("application-ineligible"));
    assert_eq!(env.notify.sent("application-submitted"), 0);
}

#[tokio::test]
async fn unknown_applications_return_not_found() {
    let env = build_env();
    let response = env
        .router
        .clone()
        .oneshot(
            Request::get(format!("/grant-applications/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_is_a_bare_array_until_a_page_is_requested() {
    let env = build_env();
    create_application(&env, &draft()).await;
    create_application(&env, &draft()).await;

    let response = env
        .router
        .clone()
        .oneshot(
            Request::get("/grant-applications")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(2));

    let response = env
        .router
        .clone()
        .oneshot(
            Request::get("/grant-applications?page=1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["total_pages"], json!(1));
    assert_eq!(payload["results"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn state_aid_listing_is_scoped_to_one_application() {
    let env = build_env();
    let created = create_application(&env, &draft()).await;
    let id = created["id"].as_str().expect("id");

    let response = env
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/state-aid",
            &json!({
                "grant_application": id,
                "authority": "Growth Hub",
                "amount": 800,
                "description": "Export readiness grant",
                "date_received": "2025-01-10",
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = env
        .router
        .clone()
        .oneshot(
            Request::get(format!("/state-aid?grant_application={id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
    assert_eq!(payload[0]["authority"], json!("Growth Hub"));
}

#[tokio::test]
async fn zero_amount_state_aid_is_unprocessable() {
    let env = build_env();
    let created = create_application(&env, &draft()).await;
    let id = created["id"].as_str().expect("id");

    let response = env
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/state-aid",
            &json!({
                "grant_application": id,
                "authority": "Growth Hub",
                "amount": 0,
                "description": "Export readiness grant",
                "date_received": "2025-01-10",
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn send_resume_link_is_accepted_and_mails_the_applicant() {
    let env = build_env();
    let created = create_application(&env, &draft()).await;
    let id = created["id"].as_str().expect("id");

    let response = env
        .router
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/grant-applications/{id}/send-resume-link"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(env.notify.sent("application-resume"), 1);
}
