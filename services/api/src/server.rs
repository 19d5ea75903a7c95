use crate::cli::ServeArgs;
use crate::infra::{build_services, open_store, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tender_portal::config::AppConfig;
use tender_portal::error::AppError;
use tender_portal::procurement::{CounterReconciler, TenderStore};
use tender_portal::telemetry;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

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

    let store = open_store(&config, args.tender_catalog.as_deref())?;
    let services = build_services(&config, &store)?;
    let reconciler = spawn_reconciler(
        services.intake.reconciler().clone(),
        store.clone(),
        config.evaluation.reconcile_interval,
    );

    let app = with_operational_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        status_policy = ?config.evaluation.status_policy,
        "tender portal ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    reconciler.abort();
    info!("tender portal stopped");
    Ok(())
}

/// Retry deferred `submissionsCount` adjustments until the server stops.
fn spawn_reconciler(
    reconciler: Arc<CounterReconciler>,
    tenders: Arc<dyn TenderStore>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let summary = reconciler.run_once(tenders.as_ref());
            if summary.applied > 0 || summary.remaining > 0 {
                info!(
                    applied = summary.applied,
                    remaining = summary.remaining,
                    "counter reconciliation pass finished"
                );
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
