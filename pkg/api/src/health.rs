use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use pkg_leader::LeadershipStatus;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
struct HealthState {
    status: LeadershipStatus,
    service_id: String,
    instance_id: String,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    service_id: String,
    instance_id: String,
    leadership: String,
    is_leader: bool,
}

/// Health endpoints for the bot process. Always 200 so that hosting
/// platforms keep a waiting instance alive; the body reports leadership.
pub fn health_router(
    status: LeadershipStatus,
    service_id: impl Into<String>,
    instance_id: impl Into<String>,
) -> Router {
    let state = HealthState {
        status,
        service_id: service_id.into(),
        instance_id: instance_id.into(),
    };
    Router::new()
        .route("/", get(report))
        .route("/health", get(report))
        .with_state(state)
}

async fn report(State(state): State<HealthState>) -> impl IntoResponse {
    let leadership = state.status.state();
    let report = HealthReport {
        status: "ok",
        service_id: state.service_id,
        instance_id: state.instance_id,
        is_leader: leadership.is_leader(),
        leadership: leadership.to_string(),
    };
    (StatusCode::OK, Json(report))
}

/// Serve `router` until `shutdown` flips to `true`.
pub async fn serve_health(
    addr: SocketAddr,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Health server listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}
