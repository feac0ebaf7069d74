use super::{AllowlistStore, RegistrationStore, Store, StoreError};
use crate::models::{
    normalize_block, AllowlistBlock, NewRegistration, Registration, RegistrationUpdate,
};
use async_trait::async_trait;
use sqlx::postgres::{PgDatabaseError, PgPool};
use std::net::IpAddr;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

const REGISTRATION_COLUMNS: &str = "id, uid, display_name, org_id, username, created_at, extra";

/// PostgreSQL-backed store. Uniqueness of `uid` is enforced by the schema.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let detail = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string());
            return StoreError::AlreadyExists(detail);
        }
    }
    StoreError::Database(err.to_string())
}

#[async_trait]
impl RegistrationStore for PostgresStore {
    async fn list_registrations(
        &self,
        org_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Registration>, i64), StoreError> {
        let registrations = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations WHERE org_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            REGISTRATION_COLUMNS
        ))
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok((registrations, total))
    }

    async fn find_registration(
        &self,
        org_id: &str,
        uid: &str,
    ) -> Result<Registration, StoreError> {
        sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations WHERE org_id = $1 AND uid = $2",
            REGISTRATION_COLUMNS
        ))
        .bind(org_id)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or(StoreError::NotFound)
    }

    async fn find_registration_by_uid(&self, uid: &str) -> Result<Registration, StoreError> {
        sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations WHERE uid = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or(StoreError::NotFound)
    }

    async fn create_registration(&self, registration: NewRegistration) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO registrations (org_id, username, uid, display_name, extra)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&registration.org_id)
        .bind(&registration.username)
        .bind(&registration.uid)
        .bind(&registration.display_name)
        .bind(&registration.extra)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::info!(org_id = %registration.org_id, uid = %registration.uid, "Created registration");
        Ok(id)
    }

    async fn update_registration(
        &self,
        org_id: &str,
        uid: &str,
        update: RegistrationUpdate,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE registrations SET extra = $3 WHERE org_id = $1 AND uid = $2")
            .bind(org_id)
            .bind(uid)
            .bind(&update.extra)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tracing::info!(org_id = %org_id, uid = %uid, "Updated registration");
        Ok(())
    }

    async fn delete_registration(&self, org_id: &str, uid: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM registrations WHERE org_id = $1 AND uid = $2")
            .bind(org_id)
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::NotFound);
        }

        tracing::info!(org_id = %org_id, uid = %uid, "Deleted registration");
        Ok(())
    }
}

#[async_trait]
impl AllowlistStore for PostgresStore {
    async fn allowed_blocks(&self, org_id: &str) -> Result<Vec<AllowlistBlock>, StoreError> {
        sqlx::query_as::<_, AllowlistBlock>(
            "SELECT ip_block, org_id, created_at FROM allowlist WHERE org_id = $1 ORDER BY created_at, id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn is_allowed(&self, ip: &str, org_id: &str) -> Result<bool, StoreError> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| StoreError::InvalidBlock(format!("invalid ip address [{}]", ip)))?;

        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM allowlist WHERE org_id = $1 AND $2::inet <<= ip_block::inet)",
        )
        .bind(org_id)
        .bind(addr.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn allow_block(&self, block: AllowlistBlock) -> Result<(), StoreError> {
        let ip_block = normalize_block(&block.ip_block).map_err(StoreError::InvalidBlock)?;

        sqlx::query("INSERT INTO allowlist (org_id, ip_block, created_at) VALUES ($1, $2, $3)")
            .bind(&block.org_id)
            .bind(&ip_block)
            .bind(block.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::info!(org_id = %block.org_id, ip_block = %ip_block, "Allowlisted block");
        Ok(())
    }

    async fn deny_block(&self, block: AllowlistBlock) -> Result<(), StoreError> {
        let ip_block = normalize_block(&block.ip_block).map_err(StoreError::InvalidBlock)?;

        let result = sqlx::query(
            r#"
            DELETE FROM allowlist WHERE id IN (
                SELECT id FROM allowlist WHERE org_id = $1 AND ip_block = $2 LIMIT 1
            )
            "#,
        )
        .bind(&block.org_id)
        .bind(&ip_block)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotAllowListed);
        }

        tracing::info!(org_id = %block.org_id, ip_block = %ip_block, "Removed allowlisted block");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                StoreError::Database(e.to_string())
            })?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
