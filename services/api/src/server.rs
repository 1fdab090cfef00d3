use crate::cli::ServeArgs;
use crate::infra::{
    AppState, HttpCompanyGateway, InMemoryApplicationRepository, InMemoryArtifactRepository,
    InMemoryCompanyRepository, InMemoryProcessRepository, LoggingNotifyGateway,
};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use trade_access::config::AppConfig;
use trade_access::error::AppError;
use trade_access::telemetry;
use trade_access::workflows::grant::applications::{
    application_router, ApplicationRouterState, ApplicationService,
};
use trade_access::workflows::grant::company::{company_router, CompanyService};
use trade_access::workflows::grant::evidence::{evidence_router, EvidenceStore, MagicLinkIssuer};
use trade_access::workflows::grant::notify::NotificationDispatcher;
use trade_access::workflows::grant::process::{process_router, ProcessRouterState, TaskQueue, WorkflowEngine};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let applications = Arc::new(InMemoryApplicationRepository::default());
    let processes = Arc::new(InMemoryProcessRepository::default());
    let companies = Arc::new(InMemoryCompanyRepository::default());
    let artifacts = Arc::new(InMemoryArtifactRepository::default());

    let issuer = MagicLinkIssuer::new(
        &config.magic_link.secret_key,
        config.magic_link.ttl_seconds as i64,
        &config.magic_link.frontend_base_url,
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(LoggingNotifyGateway),
        config.notify.enabled,
    ));

    let application_service = Arc::new(ApplicationService::new(applications.clone()));
    let engine = Arc::new(WorkflowEngine::new(
        applications,
        processes,
        dispatcher,
        issuer.clone(),
    ));
    let queue = TaskQueue::new(engine.clone());
    let company_service = Arc::new(CompanyService::new(
        companies,
        Arc::new(HttpCompanyGateway::new(&config.dnb)),
    ));
    let evidence_store = Arc::new(EvidenceStore::new(issuer, artifacts, engine.clone()));

    let grant_routes = application_router(ApplicationRouterState {
        service: application_service,
        engine: engine.clone(),
    })
    .merge(process_router(ProcessRouterState { engine, queue }))
    .merge(company_router(company_service))
    .merge(evidence_router(evidence_store));

    let app = with_service_routes(grant_routes)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "trade access grant service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
