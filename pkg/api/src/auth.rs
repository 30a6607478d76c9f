use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::AppState;

/// Middleware: authenticates the request using a Bearer token.
/// Every request passes when the server runs without a token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let token = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => {
            let value_str = value.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
            value_str
                .strip_prefix("Bearer ")
                .ok_or(StatusCode::UNAUTHORIZED)?
        }
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    if token == expected {
        Ok(next.run(req).await)
    } else {
        warn!(
            "Invalid Bearer token provided for {} {}",
            req.method(),
            req.uri().path()
        );
        Err(StatusCode::UNAUTHORIZED)
    }
}
