//! User-directory dispatch across interchangeable identity backends.

pub mod ams;
pub mod keycloak;
pub mod mock;

use crate::config::DirectoryConfig;
use crate::models::{User, UserFilter, UserV1Query, UserV3Query};
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Mock,
    ManagedAccounts,
    DirectoryService,
    Unsupported(String),
}

impl BackendKind {
    pub fn from_module(module: &str) -> Self {
        match module.trim() {
            "mock" => BackendKind::Mock,
            "ams" => BackendKind::ManagedAccounts,
            "keycloak" => BackendKind::DirectoryService,
            other => BackendKind::Unsupported(other.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, BackendKind::Unsupported(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidQuery(String),
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unsupported(msg) => AppError::BackendUnsupported(msg),
            DirectoryError::Unavailable(msg) => AppError::BadGateway(msg),
            DirectoryError::InvalidQuery(msg) => AppError::BadRequest(msg),
        }
    }
}

/// Capability every identity backend provides. Sessions are opened and closed per request.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn open(&mut self) -> Result<(), DirectoryError>;

    async fn list_users(
        &self,
        usernames: &[String],
        query: &UserV1Query,
    ) -> Result<Vec<User>, DirectoryError>;

    async fn find_users(
        &self,
        org_id: &str,
        filter: &UserFilter,
        query: &UserV3Query,
    ) -> Result<Vec<User>, DirectoryError>;

    /// Org-admin flag keyed by user id.
    async fn org_admin_status(&self, users: &[User])
        -> Result<HashMap<String, bool>, DirectoryError>;

    async fn close(&mut self);
}

#[derive(Debug, Clone)]
pub enum DirectoryQuery {
    ListUsers {
        usernames: Vec<String>,
        query: UserV1Query,
    },
    FindUsers {
        org_id: String,
        filter: UserFilter,
        query: UserV3Query,
    },
}

impl DirectoryQuery {
    fn admin_only(&self) -> bool {
        match self {
            DirectoryQuery::ListUsers { .. } => false,
            DirectoryQuery::FindUsers { query, .. } => query.admin_only,
        }
    }
}

/// Picks the configured backend and drives one session per request.
#[derive(Clone)]
pub struct Dispatcher {
    kind: BackendKind,
    config: DirectoryConfig,
}

impl Dispatcher {
    pub fn new(kind: BackendKind, config: DirectoryConfig) -> Self {
        tracing::info!(backend = ?kind, "Directory backend selected");
        Self { kind, config }
    }

    pub fn kind(&self) -> &BackendKind {
        &self.kind
    }

    fn build_client(&self) -> Result<Box<dyn UserDirectory>, DirectoryError> {
        match &self.kind {
            BackendKind::Mock => Ok(Box::new(mock::MockDirectory::new())),
            BackendKind::ManagedAccounts => Ok(Box::new(ams::AmsDirectory::new(&self.config.ams)?)),
            BackendKind::DirectoryService => Ok(Box::new(keycloak::KeycloakDirectory::new(
                &self.config.keycloak,
            )?)),
            BackendKind::Unsupported(module) => Err(DirectoryError::Unsupported(format!(
                "unsupported users module [{}]",
                module
            ))),
        }
    }

    pub async fn execute(&self, query: DirectoryQuery) -> Result<Vec<User>, DirectoryError> {
        let client = self.build_client()?;
        run_session(client, query).await
    }
}

/// Opens the client, runs one query, merges admin flags and always closes after a successful open.
pub async fn run_session(
    mut client: Box<dyn UserDirectory>,
    query: DirectoryQuery,
) -> Result<Vec<User>, DirectoryError> {
    client
        .open()
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("Can't build connection: {}", e)))?;

    let result = run_query(client.as_ref(), &query).await;
    client.close().await;

    let mut users = result?;
    if query.admin_only() {
        users.retain(|u| u.is_org_admin);
    }
    Ok(users)
}

async fn run_query(
    client: &dyn UserDirectory,
    query: &DirectoryQuery,
) -> Result<Vec<User>, DirectoryError> {
    let mut users = match query {
        DirectoryQuery::ListUsers { usernames, query } => client.list_users(usernames, query).await,
        DirectoryQuery::FindUsers {
            org_id,
            filter,
            query,
        } => client.find_users(org_id, filter, query).await,
    }
    .map_err(|e| match e {
        DirectoryError::Unavailable(msg) => {
            DirectoryError::Unavailable(format!("Cant Retrieve Users: {}", msg))
        }
        other => other,
    })?;

    if users.is_empty() {
        return Ok(users);
    }

    let admins = client.org_admin_status(&users).await.map_err(|e| {
        DirectoryError::Unavailable(format!("Cant Retrieve Role Bindings: {}", e))
    })?;
    merge_admin_status(&mut users, &admins);

    Ok(users)
}

/// Users without an entry default to not admin.
pub fn merge_admin_status(users: &mut [User], admins: &HashMap<String, bool>) {
    for user in users.iter_mut() {
        user.is_org_admin = admins.get(&user.id).copied().unwrap_or(false);
    }
}

/// Quote a value for a SQL-like upstream search expression.
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct StubDirectory {
        users: Vec<User>,
        admins: HashMap<String, bool>,
        fail_open: bool,
        fail_list: bool,
        closed: Arc<AtomicBool>,
    }

    impl StubDirectory {
        fn new(users: Vec<User>, admins: &[(&str, bool)]) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let stub = Self {
                users,
                admins: admins
                    .iter()
                    .map(|(id, admin)| (id.to_string(), *admin))
                    .collect(),
                fail_open: false,
                fail_list: false,
                closed: closed.clone(),
            };
            (stub, closed)
        }
    }

    #[async_trait]
    impl UserDirectory for StubDirectory {
        async fn open(&mut self) -> Result<(), DirectoryError> {
            if self.fail_open {
                return Err(DirectoryError::Unavailable("token exchange failed".into()));
            }
            Ok(())
        }

        async fn list_users(
            &self,
            _usernames: &[String],
            _query: &UserV1Query,
        ) -> Result<Vec<User>, DirectoryError> {
            if self.fail_list {
                return Err(DirectoryError::Unavailable("upstream returned 503".into()));
            }
            Ok(self.users.clone())
        }

        async fn find_users(
            &self,
            _org_id: &str,
            filter: &UserFilter,
            _query: &UserV3Query,
        ) -> Result<Vec<User>, DirectoryError> {
            Ok(self
                .users
                .iter()
                .filter(|u| filter.is_empty() || filter.matches(u))
                .cloned()
                .collect())
        }

        async fn org_admin_status(
            &self,
            _users: &[User],
        ) -> Result<HashMap<String, bool>, DirectoryError> {
            Ok(self.admins.clone())
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            username: format!("user{}", id),
            ..Default::default()
        }
    }

    fn list_query() -> DirectoryQuery {
        DirectoryQuery::ListUsers {
            usernames: vec!["a".into()],
            query: UserV1Query::default(),
        }
    }

    #[test]
    fn test_backend_kind_from_module() {
        assert_eq!(BackendKind::from_module("mock"), BackendKind::Mock);
        assert_eq!(BackendKind::from_module("ams"), BackendKind::ManagedAccounts);
        assert_eq!(
            BackendKind::from_module("keycloak"),
            BackendKind::DirectoryService
        );
        assert_eq!(
            BackendKind::from_module(""),
            BackendKind::Unsupported(String::new())
        );
        assert!(!BackendKind::from_module("aws").is_supported());
    }

    #[tokio::test]
    async fn test_admin_flags_merged_by_id_with_default_false() {
        let (stub, closed) = StubDirectory::new(vec![user("1"), user("2")], &[("1", true)]);

        let users = run_session(Box::new(stub), list_query()).await.unwrap();

        assert!(users[0].is_org_admin);
        assert!(!users[1].is_org_admin);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_admin_only_keeps_every_admin() {
        let (stub, _) = StubDirectory::new(
            vec![user("1"), user("2"), user("3"), user("4")],
            &[("2", true), ("3", true), ("1", false)],
        );
        let query = DirectoryQuery::FindUsers {
            org_id: "42".into(),
            filter: UserFilter::default(),
            query: UserV3Query {
                admin_only: true,
                ..Default::default()
            },
        };

        let users = run_session(Box::new(stub), query).await.unwrap();
        let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_open_failure_is_unavailable() {
        let (mut stub, closed) = StubDirectory::new(vec![user("1")], &[]);
        stub.fail_open = true;

        let err = run_session(Box::new(stub), list_query()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(ref msg) if msg.starts_with("Can't build connection")));
        assert!(!closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_operation_failure_still_closes() {
        let (mut stub, closed) = StubDirectory::new(vec![user("1")], &[]);
        stub.fail_list = true;

        let err = run_session(Box::new(stub), list_query()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unsupported_dispatcher_rejects_execution() {
        let dispatcher = Dispatcher::new(
            BackendKind::Unsupported("aws".into()),
            DirectoryConfig::default(),
        );
        let err = dispatcher.execute(list_query()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unsupported(_)));
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("o'brien"), "'o''brien'");
    }
}
