//! Caller identity from forwarded gateway headers.

use crate::models::{IdentityContext, IdentityHeader};
use base64::{engine::general_purpose::STANDARD, Engine};
use service_core::error::AppError;

pub const IDENTITY_HEADER: &str = "x-rh-identity";
pub const CERT_HEADER: &str = "x-rh-certauth-cn";

pub const CERT_HEADER_MISSING: &str = "[x-rh-certauth-cn] header not present";
pub const ORG_ID_MISSING: &str = "[org_id] not found in x-rh-identity header";

const CN_MARKER: &str = "/CN=";

/// Extracts the certificate CN: everything after the last `/CN=` in the subject header.
pub fn resolve_from_cert_header(value: &str) -> Result<String, AppError> {
    value
        .rfind(CN_MARKER)
        .map(|idx| value[idx + CN_MARKER.len()..].to_string())
        .ok_or_else(|| AppError::BadRequest(CERT_HEADER_MISSING.to_string()))
}

/// Decodes a base64 `x-rh-identity` assertion. Every identity must name its org.
pub fn decode_identity_header(value: &str) -> Result<IdentityContext, AppError> {
    let raw = STANDARD
        .decode(value.trim())
        .map_err(|e| AppError::BadRequest(format!("failed to decode identity header: {}", e)))?;

    let header: IdentityHeader = serde_json::from_slice(&raw)
        .map_err(|e| AppError::BadRequest(format!("failed to parse identity header: {}", e)))?;

    if header.identity.org_id.trim().is_empty() {
        return Err(AppError::BadRequest(ORG_ID_MISSING.to_string()));
    }

    Ok(header.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentityKind;

    #[test]
    fn test_cn_after_last_marker() {
        assert_eq!(resolve_from_cert_header("/CN=1234").unwrap(), "1234");
        assert_eq!(resolve_from_cert_header("O=foo, /CN=bar").unwrap(), "bar");
        assert_eq!(
            resolve_from_cert_header("/O=org/CN=first/CN=second").unwrap(),
            "second"
        );
    }

    #[test]
    fn test_missing_cn_rejected() {
        for value in ["", "CN=1234", "O=foo"] {
            let err = resolve_from_cert_header(value).unwrap_err();
            assert_eq!(err.message(), CERT_HEADER_MISSING);
        }
    }

    #[test]
    fn test_decode_identity_header() {
        let json = r#"{"identity":{"org_id":"1234","account_number":"5678","type":"User","user":{"username":"jdoe","is_org_admin":true}}}"#;
        let identity = decode_identity_header(&STANDARD.encode(json)).unwrap();

        assert_eq!(identity.org_id, "1234");
        assert_eq!(identity.username, "jdoe");
        assert!(identity.is_org_admin);
        assert_eq!(identity.kind, IdentityKind::User);
        assert_eq!(identity.account_number.as_deref(), Some("5678"));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_identity_header("%%%").is_err());
        assert!(decode_identity_header(&STANDARD.encode("not json")).is_err());
    }

    #[test]
    fn test_decode_requires_org_id() {
        for json in [
            r#"{"identity":{"user":{"is_org_admin":true}}}"#,
            r#"{"identity":{"org_id":"","user":{"is_org_admin":true}}}"#,
            r#"{"identity":{"org_id":"  ","type":"User"}}"#,
        ] {
            let err = decode_identity_header(&STANDARD.encode(json)).unwrap_err();
            assert_eq!(err.message(), ORG_ID_MISSING);
        }
    }
}
