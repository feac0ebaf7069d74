use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;

/// Directory routes pass through to the fallback when no backend is configured.
pub async fn directory_passthrough(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.directory.kind().is_supported() {
        return next.run(req).await;
    }

    tracing::debug!(path = %req.uri().path(), "No directory backend; forwarding to fallback");
    state.fallback.forward(req).await
}
