use crate::cli::ServeArgs;
use crate::infra::{
    licensing_api, provision_accounts, AppState, FileSystemDocumentStore, HostedCheckoutGateway,
    LoggingNotifier, Platform,
};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pmcrms::config::AppConfig;
use pmcrms::error::AppError;
use pmcrms::telemetry;
use pmcrms::workflows::licensing::memory::InMemoryDirectory;
use pmcrms::workflows::licensing::HsmClient;
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

    let platform = Platform {
        directory: InMemoryDirectory::new(),
        documents: Arc::new(FileSystemDocumentStore::open(&config.storage.media_root)?),
        notifier: Arc::new(LoggingNotifier::new(config.mail.from_address.clone())),
    };
    let api = Arc::new(licensing_api(
        &platform,
        HsmClient::new(&config.hsm)?,
        HostedCheckoutGateway::new(&config.payment, &config.mail.portal_url),
        config.payment.fee,
    ));
    provision_accounts(config.environment, &config.identity, &platform, api.as_ref())?;

    let app = with_service_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        media_root = %config.storage.media_root.display(),
        "licence workflow service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
