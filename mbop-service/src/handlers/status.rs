use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Bare status probe.
pub async fn root() -> StatusCode {
    StatusCode::OK
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_up = match state.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, backend = state.store.backend_name(), "Store health check failed");
            false
        }
    };

    let status = if store_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if store_up { "healthy" } else { "unhealthy" },
            "service": state.config.service_name,
            "version": state.config.service_version,
            "checks": {
                "store": if store_up { "up" } else { "down" },
            }
        })),
    )
}
