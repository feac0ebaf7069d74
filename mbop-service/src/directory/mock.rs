use super::{DirectoryError, UserDirectory};
use crate::models::{SortOrder, User, UserFilter, UserV1Query, UserV3Query};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use uuid::Uuid;

/// Username that makes `list_users` fail.
pub const ERROR_TRIGGER: &str = "errorTest";
/// First user id that makes `org_admin_status` return no entries.
pub const NO_ADMINS_TRIGGER: &str = "23456";

/// In-process directory serving fabricated users.
#[derive(Debug, Default)]
pub struct MockDirectory;

impl MockDirectory {
    pub fn new() -> Self {
        Self
    }

    fn fixture(org_id: &str) -> Vec<User> {
        [
            ("1001", "alice", "Alice", "Anders"),
            ("1002", "bob", "Bob", "Brown"),
            ("1003", "carol", "Carol", "Chen"),
        ]
        .into_iter()
        .map(|(id, username, first, last)| User {
            username: username.to_string(),
            id: id.to_string(),
            email: format!("{}@example.com", username),
            first_name: first.to_string(),
            last_name: last.to_string(),
            is_active: true,
            is_internal: true,
            locale: "en_US".to_string(),
            org_id: org_id.to_string(),
            display_name: username.to_string(),
            user_type: "User".to_string(),
            ..Default::default()
        })
        .collect()
    }
}

#[async_trait]
impl UserDirectory for MockDirectory {
    async fn open(&mut self) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn list_users(
        &self,
        usernames: &[String],
        _query: &UserV1Query,
    ) -> Result<Vec<User>, DirectoryError> {
        if usernames.first().map(String::as_str) == Some(ERROR_TRIGGER) {
            return Err(DirectoryError::Unavailable("internal AMS Error".to_string()));
        }

        let mut rng = rand::thread_rng();
        Ok(usernames
            .iter()
            .map(|username| User {
                username: username.clone(),
                id: Uuid::new_v4().to_string(),
                email: format!("{}@example.com", username),
                first_name: "test".to_string(),
                last_name: "user".to_string(),
                address_string: "https://users.example.com".to_string(),
                is_active: true,
                is_internal: true,
                locale: "en_US".to_string(),
                org_id: rng.gen_range(100_000..999_999).to_string(),
                display_name: format!("Mock{}", rng.gen_range(0..99)),
                user_type: "User".to_string(),
                ..Default::default()
            })
            .collect())
    }

    async fn find_users(
        &self,
        org_id: &str,
        filter: &UserFilter,
        query: &UserV3Query,
    ) -> Result<Vec<User>, DirectoryError> {
        let mut users: Vec<User> = Self::fixture(org_id)
            .into_iter()
            .filter(|u| filter.is_empty() || filter.matches(u))
            .collect();

        if query.sort_order == SortOrder::Desc {
            users.reverse();
        }

        Ok(users
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn org_admin_status(
        &self,
        users: &[User],
    ) -> Result<HashMap<String, bool>, DirectoryError> {
        match users.first().map(|u| u.id.as_str()) {
            Some(NO_ADMINS_TRIGGER) => Ok(HashMap::new()),
            Some(ERROR_TRIGGER) => Err(DirectoryError::Unavailable(
                "error retrieving Role Bindings".to_string(),
            )),
            _ => Ok(users.iter().map(|u| (u.id.clone(), true)).collect()),
        }
    }

    async fn close(&mut self) {}
}
