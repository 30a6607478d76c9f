use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pkg_state::StoreError;
use pkg_types::lease::{
    ConditionalDeleteRequest, ConditionalUpdateRequest, DeleteResponse, LeaseRecord,
    PurgeRequest, PurgeResponse,
};
use tracing::{debug, info, warn};

use crate::AppState;

/// Map a store failure onto the status codes the remote client classifies.
fn store_error(op: &str, id: &str, e: StoreError) -> Response {
    let status = match &e {
        StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        StoreError::Rejected(_) => StatusCode::BAD_REQUEST,
    };
    if status != StatusCode::CONFLICT {
        warn!("Lease {} failed for {}: {}", op, id, e);
    }
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}

/// GET /api/v1/leases/{id}
pub async fn get_lease(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.get(&id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => store_error("get", &id, e),
    }
}

/// POST /api/v1/leases: insert only if no record with this id exists.
pub async fn create_lease(
    State(state): State<AppState>,
    Json(record): Json<LeaseRecord>,
) -> Response {
    if record.id.trim().is_empty() || record.owner.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Lease id and owner are required").into_response();
    }
    match state.store.insert_if_absent(&record).await {
        Ok(()) => {
            info!(
                "Lease {} created for {} until {}",
                record.id, record.owner, record.expires_at
            );
            (StatusCode::CREATED, Json(record)).into_response()
        }
        Err(e) => store_error("insert", &record.id, e),
    }
}

/// POST /api/v1/leases/{id}/update: atomic conditional update.
/// Responds with `null` when the predicate matched nothing.
pub async fn update_lease(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConditionalUpdateRequest>,
) -> Response {
    match state
        .store
        .find_and_update_if(&id, &req.predicate, &req.update)
        .await
    {
        Ok(result) => {
            match &result {
                Some(updated) if updated.previous_owner != updated.record.owner => info!(
                    "Lease {} taken over by {} from {}",
                    id, updated.record.owner, updated.previous_owner
                ),
                Some(updated) => debug!(
                    "Lease {} extended by {} until {}",
                    id, updated.record.owner, updated.record.expires_at
                ),
                None => debug!("Lease {} update matched nothing", id),
            }
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => store_error("update", &id, e),
    }
}

/// POST /api/v1/leases/{id}/delete: atomic conditional delete.
pub async fn delete_lease(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConditionalDeleteRequest>,
) -> Response {
    match state.store.delete_if(&id, &req.predicate).await {
        Ok(deleted) => {
            if deleted {
                info!("Lease {} released", id);
            }
            (StatusCode::OK, Json(DeleteResponse { deleted })).into_response()
        }
        Err(e) => store_error("delete", &id, e),
    }
}

/// POST /api/v1/leases/purge: drop every record expired at `now`.
pub async fn purge_leases(
    State(state): State<AppState>,
    Json(req): Json<PurgeRequest>,
) -> Response {
    match state.store.purge_expired(req.now).await {
        Ok(purged) => (StatusCode::OK, Json(PurgeResponse { purged })).into_response(),
        Err(e) => store_error("purge", "*", e),
    }
}
