use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use pmcrms::workflows::licensing::{
    licensing_router, LicensingApi, PaymentGateway, SigningService,
};
use serde_json::json;
use std::sync::Arc;

/// Licence routes plus the operational endpoints.
pub(crate) fn with_service_routes<S, P>(api: Arc<LicensingApi<S, P>>) -> axum::Router
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    licensing_router(api)
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
    use crate::infra::{
        licensing_api, sandbox_payment, seed_staff, HostedCheckoutGateway, Platform,
        SandboxSigner, DEMO_PORTAL_URL,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use pmcrms::workflows::licensing::memory::{
        InMemoryDirectory, InMemoryDocumentStore, OutboxNotifier,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    fn platform() -> Platform {
        Platform {
            directory: InMemoryDirectory::new(),
            documents: Arc::new(InMemoryDocumentStore::default()),
            notifier: Arc::new(OutboxNotifier::default()),
        }
    }

    fn app(platform: &Platform, state: AppState) -> axum::Router {
        let api = Arc::new(licensing_api(
            platform,
            SandboxSigner,
            HostedCheckoutGateway::new(&sandbox_payment(3000), DEMO_PORTAL_URL),
            3000,
        ));
        seed_staff(platform, api.as_ref()).expect("roster seeds");
        with_service_routes(api).layer(Extension(state))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let state = state();

        let waiting = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(waiting.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let ready = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn merged_router_serves_operations_and_licence_routes() {
        let platform = platform();
        let app = app(&platform, state());

        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(health.status(), StatusCode::OK);

        let metrics = app
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(
            metrics
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/plain; version=0.0.4")
        );

        let listing = app
            .oneshot(
                Request::get("/api/v1/applications")
                    .header("x-user-id", "je-architect")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(listing.status(), StatusCode::OK);
        let bytes = to_bytes(listing.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let page: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(page["items"], json!([]));
    }
}
