use super::{AllowlistStore, RegistrationStore, Store, StoreError};
use crate::models::{
    normalize_block, parse_block, AllowlistBlock, NewRegistration, Registration,
    RegistrationUpdate,
};
use async_trait::async_trait;
use chrono::Utc;
use std::net::IpAddr;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    registrations: Vec<Registration>,
    allowlist: Vec<AllowlistBlock>,
}

/// Process-local store. Every operation takes the single lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn list_registrations(
        &self,
        org_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Registration>, i64), StoreError> {
        let inner = self.inner.read().await;

        // reversed so equal timestamps list the most recent insert first
        let mut matching: Vec<&Registration> = inner
            .registrations
            .iter()
            .rev()
            .filter(|r| r.org_id == org_id)
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn find_registration(
        &self,
        org_id: &str,
        uid: &str,
    ) -> Result<Registration, StoreError> {
        let inner = self.inner.read().await;
        inner
            .registrations
            .iter()
            .find(|r| r.org_id == org_id && r.uid == uid)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_registration_by_uid(&self, uid: &str) -> Result<Registration, StoreError> {
        let inner = self.inner.read().await;
        inner
            .registrations
            .iter()
            .find(|r| r.uid == uid)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_registration(&self, registration: NewRegistration) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.registrations.iter().any(|r| r.uid == registration.uid) {
            return Err(StoreError::AlreadyExists(format!(
                "uid [{}] already registered",
                registration.uid
            )));
        }

        let id = Uuid::new_v4();
        let org_id = registration.org_id.clone();
        let uid = registration.uid.clone();
        inner
            .registrations
            .push(registration.into_registration(id, Utc::now()));

        tracing::info!(org_id = %org_id, uid = %uid, "Created registration");
        Ok(id)
    }

    async fn update_registration(
        &self,
        org_id: &str,
        uid: &str,
        update: RegistrationUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let registration = inner
            .registrations
            .iter_mut()
            .find(|r| r.org_id == org_id && r.uid == uid)
            .ok_or(StoreError::NotFound)?;
        registration.extra = update.extra;

        tracing::info!(org_id = %org_id, uid = %uid, "Updated registration");
        Ok(())
    }

    async fn delete_registration(&self, org_id: &str, uid: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let index = inner
            .registrations
            .iter()
            .position(|r| r.org_id == org_id && r.uid == uid)
            .ok_or(StoreError::NotFound)?;
        inner.registrations.remove(index);

        tracing::info!(org_id = %org_id, uid = %uid, "Deleted registration");
        Ok(())
    }
}

#[async_trait]
impl AllowlistStore for MemoryStore {
    async fn allowed_blocks(&self, org_id: &str) -> Result<Vec<AllowlistBlock>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .allowlist
            .iter()
            .filter(|b| b.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn is_allowed(&self, ip: &str, org_id: &str) -> Result<bool, StoreError> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| StoreError::InvalidBlock(format!("invalid ip address [{}]", ip)))?;

        let inner = self.inner.read().await;
        Ok(inner
            .allowlist
            .iter()
            .filter(|b| b.org_id == org_id)
            .filter_map(|b| parse_block(&b.ip_block).ok())
            .any(|network| network.contains(addr)))
    }

    async fn allow_block(&self, mut block: AllowlistBlock) -> Result<(), StoreError> {
        block.ip_block = normalize_block(&block.ip_block).map_err(StoreError::InvalidBlock)?;

        let mut inner = self.inner.write().await;
        tracing::info!(org_id = %block.org_id, ip_block = %block.ip_block, "Allowlisted block");
        inner.allowlist.push(block);
        Ok(())
    }

    async fn deny_block(&self, block: AllowlistBlock) -> Result<(), StoreError> {
        let ip_block = normalize_block(&block.ip_block).map_err(StoreError::InvalidBlock)?;

        let mut inner = self.inner.write().await;
        let index = inner
            .allowlist
            .iter()
            .position(|b| b.org_id == block.org_id && b.ip_block == ip_block)
            .ok_or(StoreError::NotAllowListed)?;
        inner.allowlist.remove(index);

        tracing::info!(org_id = %block.org_id, ip_block = %ip_block, "Removed allowlisted block");
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
