//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use structura_core::JobService;
use structura_events::EventBus;
use structura_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::{EVENTS_ROUTE, HEADER_REQUEST_ID, JOBS_ROUTE_PREFIX};
use crate::http::health::{health, metrics};
use crate::http::jobs::{create_job, download_bundle, download_manifest, get_job};
use crate::http::sse::stream_events;
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper that hosts the conversion API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Wire the job service, event bus and metrics registry into the HTTP
    /// surface.
    #[must_use]
    pub fn new(jobs: Arc<dyn JobService>, events: EventBus, telemetry: Metrics) -> Self {
        let state = Arc::new(ApiState::new(jobs, events, telemetry.clone()));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(structura_telemetry::propagate_request_id_layer())
            .layer(structura_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::build_router()
            .route_layer(layered)
            .with_state(state);
        Self { router }
    }

    fn build_router() -> Router<Arc<ApiState>> {
        let job_route = format!("{JOBS_ROUTE_PREFIX}/{{name}}");
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route(JOBS_ROUTE_PREFIX, post(create_job))
            .route(&job_route, get(get_job))
            .route(&format!("{job_route}/bundle"), get(download_bundle))
            .route(&format!("{job_route}/manifest"), get(download_manifest))
            .route(EVENTS_ROUTE, get(stream_events))
    }

    /// Bind `addr` and serve until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the address cannot be bound and
    /// [`ApiServerError::Serve`] when the server stops with an I/O error.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "api listening");
        axum::serve(listener, self.router)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) fn router(&self) -> Router {
        self.router.clone()
    }
}
