//! # Tenant-scoped data access.
//!
//! Remotes never talk to the document store directly: the host exposes a
//! [`TenantRepository`] at `./data` that confines every operation to the
//! signed-in principal's tenant.
//!
//! ## Rules
//! - `query` always adds `companyId == tenant` to the caller's filters.
//! - `get` and `delete` refuse records of another tenant
//!   ([`AccessError::ForeignTenant`]).
//! - `put` stamps `companyId` and refuses to overwrite another tenant's record.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::AccessError;

use super::auth::AuthAccessor;

/// Field holding a record's tenant id.
pub const TENANT_FIELD: &str = "companyId";

/// Record body.
pub type Record = serde_json::Map<String, Value>;

/// A record and its id.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    /// Record id.
    pub id: String,
    /// Record body.
    pub fields: Record,
}

/// Equality filter on one field.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    /// Field name.
    pub field: String,
    /// Required value.
    pub value: Value,
}

impl Filter {
    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(&self.value)
    }
}

/// Backing document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Records of `collection` matching every filter, ordered by id.
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<StoredRecord>, AccessError>;

    /// Record `id` of `collection`.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, AccessError>;

    /// Creates or replaces record `id`.
    async fn put(&self, collection: &str, id: &str, record: Record) -> Result<(), AccessError>;

    /// Deletes record `id`, returning whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, AccessError>;
}

/// In-process document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Record>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<StoredRecord>, AccessError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|(_, r)| filters.iter().all(|f| f.matches(r)))
                    .map(|(id, r)| StoredRecord {
                        id: id.clone(),
                        fields: r.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, AccessError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|records| records.get(id).cloned()))
    }

    async fn put(&self, collection: &str, id: &str, record: Record) -> Result<(), AccessError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, AccessError> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .is_some_and(|records| records.remove(id).is_some()))
    }
}

/// Tenant-confined view of a [`DocumentStore`].
#[derive(Clone)]
pub struct TenantRepository {
    store: Arc<dyn DocumentStore>,
    auth: AuthAccessor,
}

impl TenantRepository {
    /// Creates a repository reading the tenant from `auth` on every call.
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthAccessor) -> Self {
        Self { store, auth }
    }

    /// Records of `collection` in the caller's tenant matching `filters`.
    pub async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<StoredRecord>, AccessError> {
        let tenant = self.auth.tenant_id()?;
        let mut scoped = Vec::with_capacity(filters.len() + 1);
        scoped.push(Filter::eq(TENANT_FIELD, tenant));
        scoped.extend(filters.iter().cloned());
        self.store.query(collection, &scoped).await
    }

    /// Record `id`, if it exists in the caller's tenant.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, AccessError> {
        let tenant = self.auth.tenant_id()?;
        match self.store.get(collection, id).await? {
            Some(record) => {
                ensure_tenant(&record, &tenant, collection, id)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Creates or replaces record `id` in the caller's tenant.
    pub async fn put(&self, collection: &str, id: &str, mut record: Record) -> Result<(), AccessError> {
        let tenant = self.auth.tenant_id()?;
        if let Some(existing) = self.store.get(collection, id).await? {
            ensure_tenant(&existing, &tenant, collection, id)?;
        }
        record.insert(TENANT_FIELD.to_string(), Value::String(tenant));
        self.store.put(collection, id, record).await
    }

    /// Deletes record `id` from the caller's tenant.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, AccessError> {
        let tenant = self.auth.tenant_id()?;
        match self.store.get(collection, id).await? {
            Some(existing) => {
                ensure_tenant(&existing, &tenant, collection, id)?;
                self.store.delete(collection, id).await
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for TenantRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRepository").finish_non_exhaustive()
    }
}

fn ensure_tenant(record: &Record, tenant: &str, collection: &str, id: &str) -> Result<(), AccessError> {
    if record.get(TENANT_FIELD).and_then(Value::as_str) == Some(tenant) {
        return Ok(());
    }
    tracing::warn!(collection, id, "cross-tenant access refused");
    Err(AccessError::ForeignTenant {
        collection: collection.to_string(),
        id: id.to_string(),
    })
}
