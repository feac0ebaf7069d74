use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use service_core::error::{AppError, MessageResponse};

use super::parse_body;
use crate::identity::{resolve_from_cert_header, CERT_HEADER, CERT_HEADER_MISSING};
use crate::middleware::CallerIdentity;
use crate::models::{
    empty_extra, CreateRegistrationRequest, ListMeta, NewRegistration, PaginationQuery,
    RegistrationListResponse, RegistrationUpdate, UpdateRegistrationRequest, DEFAULT_LIMIT,
    DEFAULT_OFFSET,
};
use crate::AppState;

const ORG_ADMIN_REQUIRED: &str = "user must be org admin to register satellite";

fn require_org_admin(identity: &CallerIdentity) -> Result<(), AppError> {
    if identity.0.is_org_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(ORG_ADMIN_REQUIRED.to_string()))
    }
}

fn parse_page_param(name: &str, raw: Option<&str>, default: usize) -> Result<i64, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default as i64),
        Some(value) => value
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or_else(|| {
                AppError::BadRequest(format!("{} must be a non-negative integer", name))
            }),
    }
}

pub async fn list_registrations(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Query(params): Query<PaginationQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_org_admin(&identity)?;

    let limit = parse_page_param("limit", params.limit.as_deref(), DEFAULT_LIMIT)?;
    let offset = parse_page_param("offset", params.offset.as_deref(), DEFAULT_OFFSET)?;

    let (registrations, total) = state
        .store
        .list_registrations(&identity.0.org_id, limit, offset)
        .await?;

    if total == 0 {
        return Err(AppError::NotFound("registration not found".to_string()));
    }

    Ok(Json(RegistrationListResponse {
        registrations,
        meta: ListMeta {
            count: total,
            limit,
            offset,
        },
    }))
}

pub async fn create_registration(
    State(state): State<AppState>,
    identity: CallerIdentity,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: CreateRegistrationRequest = parse_body(&body, "failed to unmarshal body")?;

    let uid = request
        .uid
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| AppError::BadRequest("required parameter [uid] not found in body".into()))?;

    let display_name = request
        .display_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("required parameter [display_name] not found in body".into())
        })?;

    require_org_admin(&identity)?;

    let cert_header = headers
        .get(CERT_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(CERT_HEADER_MISSING.to_string()))?;
    let gateway_cn = resolve_from_cert_header(cert_header)?;

    if gateway_cn != uid {
        return Err(AppError::Forbidden(
            "x-rh-certauth-cn does not match uid".to_string(),
        ));
    }

    let caller = identity.0;
    state
        .store
        .create_registration(NewRegistration {
            org_id: caller.org_id,
            username: caller.username,
            uid,
            display_name,
            extra: request.extra.map(Value::Object).unwrap_or_else(empty_extra),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Successfully registered")),
    ))
}

/// Path segment shared by the token endpoint and a registration whose uid is `token`.
pub const TOKEN_SEGMENT: &str = "token";

pub async fn update_registration(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(uid): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    update_by_uid(&state, &identity, &uid, &body).await
}

/// `PATCH /v1/registrations/token`, which the static token route would otherwise swallow.
pub async fn update_token_registration(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    update_by_uid(&state, &identity, TOKEN_SEGMENT, &body).await
}

async fn update_by_uid(
    state: &AppState,
    identity: &CallerIdentity,
    uid: &str,
    body: &Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let request: UpdateRegistrationRequest = parse_body(body, "failed to unmarshal body")?;
    let extra = request.extra.ok_or_else(|| {
        AppError::BadRequest("required parameter [extra] not found in body".to_string())
    })?;

    require_org_admin(identity)?;

    state
        .store
        .update_registration(
            &identity.0.org_id,
            uid,
            RegistrationUpdate {
                extra: Value::Object(extra),
            },
        )
        .await?;

    Ok(Json(MessageResponse::new("Successfully updated")))
}

pub async fn delete_registration(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(uid): Path<String>,
) -> Result<StatusCode, AppError> {
    delete_by_uid(&state, &identity, &uid).await
}

/// `DELETE /v1/registrations/token`, see [`update_token_registration`].
pub async fn delete_token_registration(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> Result<StatusCode, AppError> {
    delete_by_uid(&state, &identity, TOKEN_SEGMENT).await
}

async fn delete_by_uid(
    state: &AppState,
    identity: &CallerIdentity,
    uid: &str,
) -> Result<StatusCode, AppError> {
    if uid.is_empty() {
        return Err(AppError::BadRequest("invalid uid passed in path".to_string()));
    }

    require_org_admin(identity)?;

    state
        .store
        .delete_registration(&identity.0.org_id, uid)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
