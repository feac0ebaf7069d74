use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::{AppError, MessageResponse};

use super::parse_body;
use crate::middleware::CallerIdentity;
use crate::models::{AllowlistBlock, AllowlistRequest, DenyQuery};
use crate::AppState;

const ORG_ADMIN_REQUIRED: &str = "user must be org admin to add addresses to allowlist";

fn require_org_admin(identity: &CallerIdentity) -> Result<(), AppError> {
    if identity.0.is_org_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(ORG_ADMIN_REQUIRED.to_string()))
    }
}

pub async fn list_allowlist(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> Result<Json<Vec<AllowlistBlock>>, AppError> {
    require_org_admin(&identity)?;

    let blocks = state.store.allowed_blocks(&identity.0.org_id).await?;
    Ok(Json(blocks))
}

pub async fn create_allowlist(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    require_org_admin(&identity)?;

    let request: AllowlistRequest = parse_body(&body, "failed to unmarshal body")?;
    let ip_block = request
        .ip_block
        .filter(|block| !block.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("required parameter [ip_block] not found in body".to_string())
        })?;

    state
        .store
        .allow_block(AllowlistBlock::new(ip_block, identity.0.org_id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Successfully allowlisted")),
    ))
}

pub async fn delete_allowlist(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Query(query): Query<DenyQuery>,
) -> Result<StatusCode, AppError> {
    require_org_admin(&identity)?;

    let block = query.block.filter(|b| !b.is_empty()).ok_or_else(|| {
        AppError::BadRequest("required query parameter [block] not found".to_string())
    })?;

    state
        .store
        .deny_block(AllowlistBlock::new(block, identity.0.org_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
