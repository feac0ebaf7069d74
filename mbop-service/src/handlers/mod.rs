pub mod allowlist;
pub mod auth;
pub mod registrations;
pub mod status;
pub mod token;
pub mod users;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use service_core::error::AppError;

/// Parse a JSON body, reporting failures with the given prefix.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes, prefix: &str) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("{}: {}", prefix, e)))
}
