use serde::{Deserialize, Serialize};

/// Common projection every directory backend normalizes into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub account_number: String,
    pub address_string: String,
    pub is_active: bool,
    pub is_org_admin: bool,
    pub is_internal: bool,
    pub locale: String,
    pub org_id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub user_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserV3 {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_org_admin: bool,
    pub is_internal: bool,
    pub locale: String,
}

impl From<User> for UserV3 {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            is_org_admin: user.is_org_admin,
            is_internal: user.is_internal,
            locale: user.locale,
        }
    }
}

/// The user returned by `/v1/auth` for certificate logins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAuthUser {
    pub account_number: String,
    pub activation_keys: Vec<String>,
    pub address_string: String,
    pub display_name: String,
    pub email: String,
    pub first_name: String,
    pub id: i64,
    pub is_active: bool,
    pub is_internal: bool,
    pub is_org_admin: bool,
    pub last_name: String,
    pub locale: String,
    pub org_id: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub username: String,
}

impl CertAuthUser {
    pub fn system(org_id: &str) -> Self {
        Self {
            display_name: org_id.to_string(),
            id: -1,
            is_active: true,
            is_org_admin: true,
            org_id: org_id.to_string(),
            user_type: "system".to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub mechanism: String,
    pub user: CertAuthUser,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") | Some("asc") => Ok(SortOrder::Asc),
            Some("des") | Some("desc") => Ok(SortOrder::Desc),
            Some(other) => Err(format!(
                "sortOrder must be one of 'asc' or 'des', got [{}]",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Which user attribute the v1 usernames are matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryBy {
    #[default]
    Principal,
    UserId,
}

impl QueryBy {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") | Some("principal") => Ok(QueryBy::Principal),
            Some("userId") => Ok(QueryBy::UserId),
            Some(other) => Err(format!(
                "queryBy must be one of 'principal' or 'userId', got [{}]",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserV1Query {
    pub sort_order: SortOrder,
    pub query_by: QueryBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserV3Query {
    pub sort_order: SortOrder,
    pub admin_only: bool,
    pub limit: usize,
    pub offset: usize,
}

pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_OFFSET: usize = 0;

impl Default for UserV3Query {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::Asc,
            admin_only: false,
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

/// Raw `/v1/users` query string.
#[derive(Debug, Default, Deserialize)]
pub struct UserV1Params {
    #[serde(rename = "queryBy")]
    pub query_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
}

impl UserV1Params {
    pub fn into_query(self) -> Result<UserV1Query, String> {
        Ok(UserV1Query {
            sort_order: SortOrder::parse(self.sort_order.as_deref())?,
            query_by: QueryBy::parse(self.query_by.as_deref())?,
        })
    }
}

/// Raw `/v3` query string.
#[derive(Debug, Default, Deserialize)]
pub struct UserV3Params {
    pub admin_only: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
}

impl UserV3Params {
    pub fn into_query(self) -> Result<UserV3Query, String> {
        let admin_only = match self.admin_only.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(raw) => raw
                .parse::<bool>()
                .map_err(|_| format!("admin_only must be true or false, got [{}]", raw))?,
        };

        Ok(UserV3Query {
            sort_order: SortOrder::parse(self.sort_order.as_deref())?,
            admin_only,
            limit: parse_count("limit", self.limit.as_deref(), DEFAULT_LIMIT)?,
            offset: parse_count("offset", self.offset.as_deref(), DEFAULT_OFFSET)?,
        })
    }
}

fn parse_count(name: &str, raw: Option<&str>, default: usize) -> Result<usize, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| format!("{} must be a non-negative integer, got [{}]", name, value)),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersBody {
    #[serde(default)]
    pub users: Vec<String>,
}

/// Criteria for `/v3/accounts/:org_id/usersBy`. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserFilter {
    #[serde(rename = "primaryEmail", default)]
    pub primary_email: String,
    #[serde(rename = "emailStartsWith", default)]
    pub email_starts_with: String,
    #[serde(rename = "principalStartsWith", default)]
    pub principal_starts_with: String,
}

impl UserFilter {
    pub fn is_empty(&self) -> bool {
        self.primary_email.is_empty()
            && self.email_starts_with.is_empty()
            && self.principal_starts_with.is_empty()
    }

    pub fn matches(&self, user: &User) -> bool {
        let email = user.email.to_lowercase();

        (self.primary_email.is_empty() || email == self.primary_email.to_lowercase())
            && (self.email_starts_with.is_empty()
                || email.starts_with(&self.email_starts_with.to_lowercase()))
            && (self.principal_starts_with.is_empty()
                || user
                    .username
                    .to_lowercase()
                    .starts_with(&self.principal_starts_with.to_lowercase()))
    }
}
