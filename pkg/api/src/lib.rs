pub mod auth;
pub mod handlers;
pub mod health;
pub mod request_id;
pub mod server;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;

use pkg_state::LeaseStore;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LeaseStore>,
    /// Bearer token required on `/api/v1/*`. `None` disables auth.
    pub token: Option<String>,
}
