use crate::cli::ServeArgs;
use crate::infra::{build_service, load_directory, AppState, PlacifyService};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use placify::config::{AppConfig, RetentionConfig};
use placify::error::AppError;
use placify::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed) = args.seed.take() {
        config.seed_path = Some(seed);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = load_directory(config.seed_path.as_deref())?;
    let (application_service, _backends) = build_service(directory, config.uploads);
    let sweep = spawn_retention_sweep(application_service.clone(), config.retention);

    let app = with_application_routes(application_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_resume_bytes = config.uploads.max_resume_bytes,
        retention_days = config.retention.max_job_age_days,
        "placify application service ready"
    );

    let served = axum::serve(listener, app).await;
    sweep.abort();
    served?;
    Ok(())
}

/// Periodically drop applications whose job is older than the retention window.
fn spawn_retention_sweep(
    service: Arc<PlacifyService>,
    retention: RetentionConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(retention.sweep_interval());
        loop {
            ticker.tick().await;
            match service.purge_stale(Utc::now(), retention.max_job_age()) {
                Ok(0) => {}
                Ok(removed) => info!(removed, "retention sweep removed applications"),
                Err(err) => warn!(error = %err, "retention sweep failed"),
            }
        }
    })
}
