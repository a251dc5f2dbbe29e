//! The operator-facing HTTP surface: Prometheus metrics plus engine
//! readiness and status.
//!
//! Liveness (`/healthz`) is unconditional; readiness (`/readyz`) and the
//! status line (`/statusz`) come from the engine through a
//! [`StatusSource`], so a draining node stops admitting traffic before it
//! stops answering.

use axum::{
    error_handling::HandleErrorLayer,
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

/// A point-in-time view of the engine behind this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Peers currently attached to the sync manager.
    pub connected_peers: usize,
    /// Live CoValue cores in the registry.
    pub covalues: usize,
    /// False once the node has begun draining; `/readyz` answers 503.
    pub accepting: bool,
}

/// Implemented by the engine component that can report readiness. The sync
/// manager is the production source; tests substitute a fixed status.
pub trait StatusSource: Send + Sync {
    /// The current engine status.
    fn status(&self) -> EngineStatus;
}

fn render_status(status: &EngineStatus) -> String {
    format!(
        "accepting={} peers={} covalues={}\n",
        status.accepting, status.connected_peers, status.covalues
    )
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    match encoder.encode(&prometheus::gather(), &mut buf) {
        Ok(()) => {
            ([(CONTENT_TYPE, encoder.format_type().to_string())], buf).into_response()
        }
        Err(e) => {
            tracing::error!(target: "telemetry", error = %e, "metrics_encode_failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz_handler() -> &'static str {
    "OK"
}

async fn readyz_handler(State(status): State<Arc<dyn StatusSource>>) -> impl IntoResponse {
    if status.status().accepting {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    }
}

async fn statusz_handler(State(status): State<Arc<dyn StatusSource>>) -> String {
    render_status(&status.status())
}

async fn handle_middleware_error(err: BoxError) -> StatusCode {
    if err.is::<tower::timeout::error::Elapsed>() {
        StatusCode::REQUEST_TIMEOUT
    } else {
        tracing::error!(target: "telemetry", error = %err, "http_middleware_error");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Serves `/metrics`, `/healthz`, `/readyz`, and `/statusz` until ctrl-c.
pub async fn run_server(addr: SocketAddr, status: Arc<dyn StatusSource>) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/statusz", get(statusz_handler))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(Duration::from_secs(5)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(status);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(target: "telemetry", %addr, error = %e, "telemetry_bind_failed");
            return;
        }
    };
    tracing::info!(target: "telemetry", %addr, "telemetry_listening");

    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(target: "telemetry", error = %e, "telemetry_server_error");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "telemetry", error = %e, "ctrl_c_handler_failed");
    }
    tracing::info!(target: "telemetry", "telemetry_shutdown");
}
