//! Directory-service backend: a keycloak token plus the REST user service.

use super::{DirectoryError, UserDirectory};
use crate::config::KeycloakConfig;
use crate::models::{User, UserFilter, UserV1Query, UserV3Query};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use service_core::observability::trace_context::inject_trace_context;
use std::collections::HashMap;
use std::time::Duration;

const V1_LOOKUP_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct UserServiceResponse {
    #[serde(default)]
    users: Vec<UserServiceRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct UserServiceRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    is_internal: bool,
    #[serde(default)]
    org_admin: bool,
    #[serde(default)]
    org_id: String,
    #[serde(default, rename = "type")]
    user_type: String,
}

impl From<UserServiceRecord> for User {
    fn from(record: UserServiceRecord) -> Self {
        User {
            username: record.username,
            id: record.id,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            is_active: true,
            is_org_admin: record.org_admin,
            is_internal: record.is_internal,
            locale: "en_US".to_string(),
            org_id: record.org_id,
            display_name: record.user_id,
            user_type: record.user_type,
            ..Default::default()
        }
    }
}

pub struct KeycloakDirectory {
    token_http: reqwest::Client,
    users_http: reqwest::Client,
    config: KeycloakConfig,
    token: Option<String>,
}

impl KeycloakDirectory {
    pub fn new(config: &KeycloakConfig) -> Result<Self, DirectoryError> {
        let build = |secs: u64| {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(secs))
                .build()
                .map_err(|e| {
                    DirectoryError::Unsupported(format!("failed to build keycloak client: {}", e))
                })
        };

        Ok(Self {
            token_http: build(config.timeout_seconds)?,
            users_http: build(config.user_service_timeout_seconds)?,
            config: config.clone(),
            token: None,
        })
    }

    async fn fetch_users(&self, query: &[(&str, String)]) -> Result<Vec<User>, DirectoryError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| DirectoryError::Unavailable("keycloak session not open".to_string()))?;

        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        let url = format!("{}/users", self.config.user_service_base());
        let response = self
            .users_http
            .get(&url)
            .headers(headers)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Error fetching user service response");
                DirectoryError::Unavailable(format!("user service request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "user service returned status {}",
                status
            )));
        }

        let body: UserServiceResponse = response.json().await.map_err(|e| {
            DirectoryError::Unavailable(format!("invalid user service response: {}", e))
        })?;

        Ok(body.users.into_iter().map(User::from).collect())
    }
}

#[async_trait]
impl UserDirectory for KeycloakDirectory {
    async fn open(&mut self) -> Result<(), DirectoryError> {
        let params = [
            ("username", self.config.token_username.as_str()),
            ("password", self.config.token_password.as_str()),
            ("grant_type", self.config.token_grant_type.as_str()),
            ("client_id", self.config.token_client_id.as_str()),
        ];

        let response = self
            .token_http
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                DirectoryError::Unavailable(format!("error fetching keycloak token response: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "keycloak token endpoint returned status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            DirectoryError::Unavailable(format!("error reading keycloak token response: {}", e))
        })?;
        self.token = Some(token.access_token);

        tracing::debug!("Keycloak session opened");
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

        self.fetch_users(&[
            ("limit", V1_LOOKUP_LIMIT.to_string()),
            ("order", "username".to_string()),
            ("direction", query.sort_order.as_str().to_string()),
            ("usernames", usernames.join(",")),
        ])
        .await
    }

    async fn find_users(
        &self,
        org_id: &str,
        filter: &UserFilter,
        query: &UserV3Query,
    ) -> Result<Vec<User>, DirectoryError> {
        let users = self
            .fetch_users(&[
                ("org_id", org_id.to_string()),
                ("limit", query.limit.to_string()),
                ("offset", query.offset.to_string()),
                ("direction", query.sort_order.as_str().to_string()),
            ])
            .await?;

        Ok(users
            .into_iter()
            .filter(|u| filter.is_empty() || filter.matches(u))
            .collect())
    }

    async fn org_admin_status(
        &self,
        users: &[User],
    ) -> Result<HashMap<String, bool>, DirectoryError> {
        Ok(users
            .iter()
            .map(|u| (u.id.clone(), u.is_org_admin))
            .collect())
    }

    async fn close(&mut self) {
        self.token = None;
    }
}
