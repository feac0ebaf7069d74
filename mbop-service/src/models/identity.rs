use serde::{Deserialize, Serialize};

/// Wire shape of the base64-encoded `x-rh-identity` header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityHeader {
    pub identity: IdentityBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityBody {
    #[serde(default)]
    pub org_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(rename = "type", default)]
    pub identity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityUser>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub is_org_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    User,
    System,
}

/// Caller identity attached to every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub org_id: String,
    pub username: String,
    pub is_org_admin: bool,
    pub kind: IdentityKind,
    pub account_number: Option<String>,
}

impl IdentityContext {
    /// Identity of a registered agent authenticated only by its certificate.
    pub fn system(org_id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            username: uid.into(),
            is_org_admin: true,
            kind: IdentityKind::System,
            account_number: None,
        }
    }
}

impl From<IdentityHeader> for IdentityContext {
    fn from(header: IdentityHeader) -> Self {
        let body = header.identity;
        let user = body.user.unwrap_or_default();
        let kind = if body.identity_type.eq_ignore_ascii_case("system") {
            IdentityKind::System
        } else {
            IdentityKind::User
        };

        Self {
            org_id: body.org_id,
            username: user.username,
            is_org_admin: user.is_org_admin,
            kind,
            account_number: body.account_number.filter(|a| !a.is_empty()),
        }
    }
}
