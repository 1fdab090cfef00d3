use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;

/// Attach the operational endpoints to the grant routers.
pub(crate) fn with_service_routes(grant_routes: axum::Router) -> axum::Router {
    grant_routes
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_prometheus::PrometheusMetricLayer;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn state(ready: bool) -> AppState {
        // The prometheus recorder is process-global and can only be installed
        // once, so every test state shares a single handle.
        static METRICS: std::sync::OnceLock<Arc<metrics_exporter_prometheus::PrometheusHandle>> =
            std::sync::OnceLock::new();
        let metrics = METRICS
            .get_or_init(|| {
                let (_, handle) = PrometheusMetricLayer::pair();
                Arc::new(handle)
            })
            .clone();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics,
        }
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let response = readiness_endpoint(Extension(state(false))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(state(true))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
