use axum::{Json, http::StatusCode, response::IntoResponse};

/// GET /health: liveness of the lease server itself.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "healthy"})))
}
