use crate::cli::ServeArgs;
use crate::infra::{in_memory_service, AppState};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use grant_portal::config::AppConfig;
use grant_portal::error::AppError;
use grant_portal::telemetry;
use grant_portal::workflows::grants::UserRosterImporter;
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

    let (portal_service, _outbox) = in_memory_service(&config.portal);
    if let Some(path) = args.users.take() {
        let users = UserRosterImporter::from_path(&path)?;
        let seeded = users.len();
        for user in users {
            portal_service.register_user(user)?;
        }
        info!(users = seeded, path = %path.display(), "user roster loaded");
    }

    let app = with_portal_routes(portal_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, pass_mark = config.portal.pass_mark, "grant portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
