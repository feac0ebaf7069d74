use axum::{extract::State, http::HeaderMap, Json};
use service_core::error::AppError;

use crate::identity::{resolve_from_cert_header, CERT_HEADER, CERT_HEADER_MISSING};
use crate::models::{AuthResponse, CertAuthUser};
use crate::AppState;

/// Certificate login: the CN must belong to a registered agent.
pub async fn auth_v1(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AuthResponse>, AppError> {
    let header = headers
        .get(CERT_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(CERT_HEADER_MISSING.to_string()))?;
    let gateway_cn = resolve_from_cert_header(header)?;

    let registration = state.store.find_registration_by_uid(&gateway_cn).await?;

    Ok(Json(AuthResponse {
        mechanism: "cert".to_string(),
        user: CertAuthUser::system(&registration.org_id),
    }))
}
