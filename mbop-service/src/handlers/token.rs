use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::middleware::CallerIdentity;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn issue_token(
    State(state): State<AppState>,
    CallerIdentity(identity): CallerIdentity,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.tokens.issue(&identity)?;

    tracing::info!(org_id = %identity.org_id, username = %identity.username, "Issued token");
    Ok(Json(TokenResponse { token }))
}
