use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::identity::{
    decode_identity_header, resolve_from_cert_header, CERT_HEADER, IDENTITY_HEADER,
};
use crate::models::IdentityContext;
use crate::store::StoreError;
use crate::AppState;

/// Resolve the caller from `x-rh-identity`, falling back to a registered certificate CN.
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(&state, req.headers()).await?;

    tracing::debug!(
        org_id = %identity.org_id,
        kind = ?identity.kind,
        "Resolved caller identity"
    );

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

async fn resolve_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<IdentityContext, AppError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };

    if let Some(value) = header(IDENTITY_HEADER) {
        return decode_identity_header(value);
    }

    if let Some(value) = header(CERT_HEADER) {
        let uid = resolve_from_cert_header(value)?;
        return match state.store.find_registration_by_uid(&uid).await {
            Ok(registration) => Ok(IdentityContext::system(registration.org_id, registration.uid)),
            Err(StoreError::NotFound) => Err(AppError::Unauthorized(
                "no registration found for certificate".to_string(),
            )),
            Err(e) => Err(e.into()),
        };
    }

    Err(AppError::BadRequest(format!(
        "missing [{}] header",
        IDENTITY_HEADER
    )))
}

/// Extractor for the identity placed by `require_identity`.
pub struct CallerIdentity(pub IdentityContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .map(CallerIdentity)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "identity missing from request extensions"
                ))
            })
    }
}
