use grant_portal::config::PortalConfig;
use grant_portal::workflows::grants::{
    GrantPortalService, InMemoryMailer, InMemoryPageCache, InMemoryPortalRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type PortalService =
    GrantPortalService<InMemoryPortalRepository, InMemoryMailer, InMemoryPageCache>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Portal service over the process-local adapters, plus a handle on the captured outbox.
pub(crate) fn in_memory_service(
    config: &PortalConfig,
) -> (Arc<PortalService>, Arc<InMemoryMailer>) {
    let mailer = Arc::new(InMemoryMailer::default());
    let service = Arc::new(GrantPortalService::new(
        Arc::new(InMemoryPortalRepository::default()),
        mailer.clone(),
        Arc::new(InMemoryPageCache::default()),
        config,
    ));
    (service, mailer)
}
