use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryRoleStore, InMemoryUserDirectory};
use crate::routes::with_role_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rolecall::config::AppConfig;
use rolecall::error::AppError;
use rolecall::roles::RoleApplicationService;
use rolecall::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let store = Arc::new(InMemoryRoleStore::default());
    let directory = Arc::new(InMemoryUserDirectory::seeded());
    let policy = config.allocation.commit_policy();
    let role_service = Arc::new(RoleApplicationService::new(store, directory, policy));

    let app = with_role_routes(role_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_commit_attempts = policy.max_attempts(),
        "role allocation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
