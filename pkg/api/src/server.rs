use axum::{
    Router, middleware,
    routing::{get, post},
};
use pkg_constants::lease::EXPIRY_SWEEP_INTERVAL_SECS;
use pkg_state::LeaseStore;
use pkg_state::client::StateStore;
use pkg_state::slate::SlateLeaseStore;
use pkg_state::sweeper::ExpirySweeper;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::AppState;
use crate::auth::auth_middleware;
use crate::handlers::{health, leases};
use crate::request_id::request_id_middleware;

/// Server configuration passed from the binary's CLI.
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub data_dir: String,
    pub token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    // Protected API routes
    let api_routes = Router::new()
        .route("/api/v1/leases", post(leases::create_lease))
        .route("/api/v1/leases/purge", post(leases::purge_leases))
        .route("/api/v1/leases/{id}", get(leases::get_lease))
        .route("/api/v1/leases/{id}/update", post(leases::update_lease))
        .route("/api/v1/leases/{id}/delete", post(leases::delete_lease))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn(request_id_middleware));

    Router::new()
        .route("/health", get(health::health))
        .merge(api_routes)
        .with_state(state)
}

/// Open the durable store, start passive expiry, and serve until `shutdown`.
pub async fn start_server(
    config: ServerConfig,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let state_store = StateStore::new(&config.data_dir).await?;
    let store: Arc<dyn LeaseStore> = Arc::new(SlateLeaseStore::new(state_store.clone()));

    let sweeper = ExpirySweeper::new(
        Arc::clone(&store),
        Duration::from_secs(EXPIRY_SWEEP_INTERVAL_SECS),
    )
    .start(shutdown.clone());

    if config.token.is_none() {
        tracing::warn!("No API token configured; lease API is unauthenticated");
    }
    let state = AppState {
        store,
        token: config.token,
    };

    info!("Starting lease server on {}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    serve(listener, state, shutdown).await?;

    sweeper.await?;
    state_store.close().await?;
    info!("Lease server stopped");
    Ok(())
}

/// Serve the lease API on an already-bound listener until `shutdown` flips.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

// ─── Tests ─────────────────────────────────────────────────────
