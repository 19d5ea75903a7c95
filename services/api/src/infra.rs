use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tender_portal::config::{AppConfig, EmailConfig, StoreBackend};
use tender_portal::error::AppError;
use tender_portal::procurement::catalog;
use tender_portal::procurement::{
    EmailProvider, FsDocumentStore, HttpEmailProvider, InMemoryProcurementStore,
    LogEmailProvider, ProcurementServices,
};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store selected by `DATABASE_URL`, optionally seeded from a catalog export.
pub(crate) fn open_store(
    config: &AppConfig,
    tender_catalog: Option<&Path>,
) -> Result<Arc<InMemoryProcurementStore>, AppError> {
    let store = match config.storage.backend {
        StoreBackend::Memory => Arc::new(InMemoryProcurementStore::new()),
    };

    match tender_catalog {
        Some(path) => {
            let seeded = catalog::load_into(path, &store)?;
            info!(path = %path.display(), tenders = seeded, "tender catalog loaded");
        }
        None => warn!("no tender catalog supplied; every submission will report tender not found"),
    }
    Ok(store)
}

pub(crate) fn email_provider(config: &EmailConfig) -> Arc<dyn EmailProvider> {
    match &config.api_key {
        Some(api_key) => Arc::new(HttpEmailProvider::new(
            config.api_url.clone(),
            api_key.clone(),
            config.from_address.clone(),
        )),
        None => {
            warn!("EMAIL_API_KEY not set; outcome notifications are logged instead of sent");
            Arc::new(LogEmailProvider)
        }
    }
}

pub(crate) fn build_services(
    config: &AppConfig,
    store: &Arc<InMemoryProcurementStore>,
) -> Result<ProcurementServices, AppError> {
    std::fs::create_dir_all(&config.storage.document_dir)?;
    let documents = Arc::new(FsDocumentStore::new(config.storage.document_dir.clone()));

    Ok(ProcurementServices::new(
        store.clone(),
        store.clone(),
        documents,
        email_provider(&config.email),
        config.evaluation.status_policy,
    )
    .with_error_detail(config.environment.exposes_error_detail()))
}
