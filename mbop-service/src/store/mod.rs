//! Registration and allowlist persistence.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{AllowlistBlock, NewRegistration, Registration, RegistrationUpdate};
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("registration not found")]
    NotFound,

    #[error("existing registration found: {0}")]
    AlreadyExists(String),

    #[error("ip not allowlisted")]
    NotAllowListed,

    #[error("{0}")]
    InvalidBlock(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("registration not found".to_string()),
            StoreError::AlreadyExists(detail) => {
                tracing::info!(detail = %detail, "Rejected duplicate registration");
                AppError::Conflict("existing registration found".to_string())
            }
            StoreError::NotAllowListed => AppError::NotFound("ip not allowlisted".to_string()),
            StoreError::InvalidBlock(msg) => AppError::BadRequest(msg),
            StoreError::Database(msg) => AppError::DatabaseError(anyhow::anyhow!(msg)),
        }
    }
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// One page of an org's registrations, newest first, with the org-wide total.
    async fn list_registrations(
        &self,
        org_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Registration>, i64), StoreError>;

    async fn find_registration(&self, org_id: &str, uid: &str)
        -> Result<Registration, StoreError>;

    async fn find_registration_by_uid(&self, uid: &str) -> Result<Registration, StoreError>;

    async fn create_registration(&self, registration: NewRegistration) -> Result<Uuid, StoreError>;

    async fn update_registration(
        &self,
        org_id: &str,
        uid: &str,
        update: RegistrationUpdate,
    ) -> Result<(), StoreError>;

    async fn delete_registration(&self, org_id: &str, uid: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AllowlistStore: Send + Sync {
    async fn allowed_blocks(&self, org_id: &str) -> Result<Vec<AllowlistBlock>, StoreError>;

    /// True when any of the org's blocks contains `ip`.
    async fn is_allowed(&self, ip: &str, org_id: &str) -> Result<bool, StoreError>;

    async fn allow_block(&self, block: AllowlistBlock) -> Result<(), StoreError>;

    /// Removes exactly one `(org_id, ip_block)` match.
    async fn deny_block(&self, block: AllowlistBlock) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: RegistrationStore + AllowlistStore {
    async fn health_check(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Build the configured store. The relational backend runs migrations first.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn Store>, AppError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = crate::db::create_pool(&config.database)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            crate::db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            Ok(Arc::new(PostgresStore::new(pool)))
        }
    }
}
