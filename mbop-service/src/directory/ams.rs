//! Managed-accounts (AMS) REST backend.

use super::{quote, DirectoryError, UserDirectory};
use crate::config::AmsConfig;
use crate::models::{QueryBy, User, UserFilter, UserV1Query, UserV3Query};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use service_core::observability::trace_context::inject_trace_context;
use std::collections::HashMap;
use std::time::Duration;

const ACCOUNTS_PATH: &str = "/api/accounts_mgmt/v1/accounts";
const ROLE_BINDINGS_PATH: &str = "/api/accounts_mgmt/v1/role_bindings";
const ORG_ADMIN_ROLE: &str = "OrganizationAdmin";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Account {
    #[serde(default)]
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    organization: Option<Organization>,
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Default, Deserialize)]
struct Organization {
    #[serde(default)]
    external_id: String,
    #[serde(default)]
    ebs_account_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Label {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RoleBinding {
    account: Option<Reference>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    id: String,
}

pub struct AmsDirectory {
    http: reqwest::Client,
    config: AmsConfig,
    token: Option<String>,
}

impl AmsDirectory {
    pub fn new(config: &AmsConfig) -> Result<Self, DirectoryError> {
        if config.url.is_empty() || config.oauth_token_url.is_empty() {
            return Err(DirectoryError::Unsupported(
                "ams module requires AMS_URL and OAUTH_TOKEN_URL".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DirectoryError::Unsupported(format!("failed to build ams client: {}", e)))?;

        Ok(Self {
            http,
            config: config.clone(),
            token: None,
        })
    }

    fn is_internal(&self, account: &Account) -> bool {
        !self.config.is_internal_label.is_empty()
            && account
                .labels
                .iter()
                .any(|label| label.value == self.config.is_internal_label)
    }

    fn to_user(&self, account: Account) -> User {
        let is_internal = self.is_internal(&account);
        let organization = account.organization.unwrap_or_default();

        User {
            display_name: account.username.clone(),
            username: account.username,
            id: account.id,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            account_number: organization.ebs_account_id,
            is_active: true,
            is_internal,
            locale: "en_US".to_string(),
            org_id: organization.external_id,
            user_type: "User".to_string(),
            ..Default::default()
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DirectoryError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| DirectoryError::Unavailable("ams session not open".to_string()))?;

        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
        let response = self
            .http
            .get(&url)
            .headers(headers)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("ams request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), path = %path, "AMS request rejected");
            return Err(DirectoryError::Unavailable(format!(
                "ams returned status {}",
                status
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("invalid ams response: {}", e)))
    }

    async fn search_accounts(
        &self,
        search: String,
        order: String,
        page: usize,
        size: usize,
    ) -> Result<Vec<User>, DirectoryError> {
        let page: Page<Account> = self
            .get(
                ACCOUNTS_PATH,
                &[
                    ("search", search),
                    ("orderBy", order),
                    ("page", page.to_string()),
                    ("size", size.to_string()),
                ],
            )
            .await?;

        Ok(page.items.into_iter().map(|a| self.to_user(a)).collect())
    }
}

fn in_clause(values: &[String]) -> String {
    values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(",")
}

/// Search expression for `/v3` lookups within one organization.
fn org_search(org_id: &str, filter: &UserFilter) -> String {
    let mut terms = vec![format!("organization.external_id={}", quote(org_id))];

    if !filter.primary_email.is_empty() {
        terms.push(format!("email={}", quote(&filter.primary_email)));
    }
    if !filter.email_starts_with.is_empty() {
        terms.push(format!("email like {}", quote(&format!("{}%", filter.email_starts_with))));
    }
    if !filter.principal_starts_with.is_empty() {
        terms.push(format!(
            "username like {}",
            quote(&format!("{}%", filter.principal_starts_with))
        ));
    }

    terms.join(" and ")
}

#[async_trait]
impl UserDirectory for AmsDirectory {
    async fn open(&mut self) -> Result<(), DirectoryError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", self.config.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.oauth_token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "token endpoint returned status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("invalid token response: {}", e)))?;
        self.token = Some(token.access_token);

        tracing::debug!("AMS session opened");
        Ok(())
    }

    async fn list_users(
        &self,
        usernames: &[String],
        query: &UserV1Query,
    ) -> Result<Vec<User>, DirectoryError> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let field = match query.query_by {
            QueryBy::Principal => "username",
            QueryBy::UserId => "id",
        };
        let search = format!("{} in ({})", field, in_clause(usernames));
        let order = format!("{} {}", field, query.sort_order.as_str());

        self.search_accounts(search, order, 1, usernames.len()).await
    }

    async fn find_users(
        &self,
        org_id: &str,
        filter: &UserFilter,
        query: &UserV3Query,
    ) -> Result<Vec<User>, DirectoryError> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let page = page_for(query.offset, query.limit)?;
        let order = format!("username {}", query.sort_order.as_str());

        self.search_accounts(org_search(org_id, filter), order, page, query.limit)
            .await
    }

    async fn org_admin_status(
        &self,
        users: &[User],
    ) -> Result<HashMap<String, bool>, DirectoryError> {
        if users.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();
        let search = format!(
            "account.id in ({}) and role.id={}",
            in_clause(&ids),
            quote(ORG_ADMIN_ROLE)
        );

        let bindings: Page<RoleBinding> = self
            .get(
                ROLE_BINDINGS_PATH,
                &[("search", search), ("size", ids.len().to_string())],
            )
            .await?;

        let mut admins: HashMap<String, bool> = ids.into_iter().map(|id| (id, false)).collect();
        for account in bindings.items.into_iter().filter_map(|b| b.account) {
            admins.insert(account.id, true);
        }
        Ok(admins)
    }

    async fn close(&mut self) {
        self.token = None;
    }
}

/// AMS pages are 1-based with a fixed size, so the offset must sit on a page boundary.
fn page_for(offset: usize, limit: usize) -> Result<usize, DirectoryError> {
    if offset % limit != 0 {
        return Err(DirectoryError::InvalidQuery(format!(
            "offset [{}] must be a multiple of limit [{}]",
            offset, limit
        )));
    }
    Ok(offset / limit + 1)
}
