use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use bankeu_workflow::config::AppConfig;
use bankeu_workflow::error::AppError;
use bankeu_workflow::telemetry;

use crate::cli::ServeArgs;
use crate::infra::{build_workflow_service, AppState, ToggleGateway};
use crate::routes::with_workflow_routes;

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

    let (workflow_service, _store) = build_workflow_service();
    let gateway = Arc::new(ToggleGateway::new(config.workflow.initial_gateway()));

    let app = with_workflow_routes(workflow_service, gateway)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, gateway_open = config.workflow.gateway_open, "bankeu approval workflow ready");

    axum::serve(listener, app).await?;
    Ok(())
}
