//! Host runtime exports shared with every remote.
//!
//! The host publishes its own container under
//! [`HostConfig::exports_name`](crate::HostConfig::exports_name) (default
//! `host`), so remotes obtain the shared instances through the same container
//! contract they use among themselves:
//!
//! ```text
//! host container
//!   ./auth      → AuthAccessor      (signed-in principal, capabilities)
//!   ./data      → TenantRepository  (tenant-scoped document access)
//!   ./realtime  → RealtimeClient    (one shared connection)
//! ```
//!
//! [`HostImports::resolve`] is the remote-side counterpart.

mod auth;
mod data;
mod realtime;

use std::sync::Arc;

use crate::error::LoadError;
use crate::loader::{ContainerHandle, Module, RawContainer, SharedScope};
use crate::page::GlobalScope;

pub use auth::{AuthAccessor, AuthContext, Principal};
pub use data::{DocumentStore, Filter, MemoryStore, Record, StoredRecord, TENANT_FIELD, TenantRepository};
pub use realtime::{
    Ack, ClientHandle, Envelope, ListenerId, LoopbackTransport, RealtimeClient,
    RealtimeConnection, RealtimeTransport, ServerHandler,
};

/// Exposed path of the auth accessor.
pub const AUTH_PATH: &str = "./auth";
/// Exposed path of the tenant repository.
pub const DATA_PATH: &str = "./data";
/// Exposed path of the realtime client.
pub const REALTIME_PATH: &str = "./realtime";

/// Instances the host shares with remotes.
#[derive(Clone, Debug)]
pub struct HostExports {
    /// Shared auth accessor.
    pub auth: AuthAccessor,
    /// Tenant-scoped data access.
    pub data: TenantRepository,
    /// Shared realtime client.
    pub realtime: Arc<RealtimeClient>,
}

impl HostExports {
    /// Bundles the shared instances; `data` reads its tenant from `auth`.
    pub fn new(
        auth: AuthAccessor,
        store: Arc<dyn DocumentStore>,
        realtime: Arc<RealtimeClient>,
    ) -> Self {
        Self {
            data: TenantRepository::new(store, auth.clone()),
            auth,
            realtime,
        }
    }

    /// Container exposing the instances at [`AUTH_PATH`], [`DATA_PATH`] and
    /// [`REALTIME_PATH`].
    pub fn into_container(self) -> RawContainer {
        RawContainer::builder()
            .init(|_| async { Ok(()) })
            .expose_module(AUTH_PATH, Module::value(self.auth))
            .expose_module(DATA_PATH, Module::value(self.data))
            .expose_module(REALTIME_PATH, Module::Value(self.realtime))
            .build()
    }
}

/// Shared instances as seen from a remote.
#[derive(Clone, Debug)]
pub struct HostImports {
    /// Shared auth accessor.
    pub auth: Arc<AuthAccessor>,
    /// Tenant-scoped data access.
    pub data: Arc<TenantRepository>,
    /// Shared realtime client.
    pub realtime: Arc<RealtimeClient>,
}

impl HostImports {
    /// Resolves the host container `name` from `globals`.
    pub async fn resolve(
        globals: &GlobalScope,
        name: &str,
        scope: &SharedScope,
    ) -> Result<Self, LoadError> {
        let raw = globals.lookup(name).ok_or_else(|| LoadError::ContainerShape {
            remote: name.to_string(),
            reason: "host exports are not installed".to_string(),
        })?;
        let container = ContainerHandle::adapt(name, raw)?.initialize(scope).await?;

        let auth = container.get_exposed_module(AUTH_PATH).await?;
        let data = container.get_exposed_module(DATA_PATH).await?;
        let realtime = container.get_exposed_module(REALTIME_PATH).await?;

        let wrong_type = |path: &str| LoadError::ModuleFetch {
            remote: name.to_string(),
            path: path.to_string(),
            reason: "unexpected export type".to_string(),
        };
        Ok(Self {
            auth: auth.downcast().ok_or_else(|| wrong_type(AUTH_PATH))?,
            data: data.downcast().ok_or_else(|| wrong_type(DATA_PATH))?,
            realtime: realtime.downcast().ok_or_else(|| wrong_type(REALTIME_PATH))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RealtimeConfig;
    use crate::registry::Role;

    #[tokio::test]
    async fn remotes_share_the_host_instances() {
        let auth = AuthAccessor::new();
        let realtime = Arc::new(RealtimeClient::new(
            Arc::new(LoopbackTransport::silent()),
            &RealtimeConfig::default(),
        ));
        let exports = HostExports::new(auth.clone(), Arc::new(MemoryStore::new()), realtime.clone());

        let globals = GlobalScope::new();
        globals.install("host", exports.into_container());

        let imports = HostImports::resolve(&globals, "host", &SharedScope::new())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&imports.realtime, &realtime));

        auth.sign_in(auth::tests::context(Role::User, "acme", &[]));
        assert_eq!(imports.auth.tenant_id().unwrap(), "acme");
        assert!(imports.data.query("users", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_host_container() {
        let err = HostImports::resolve(&GlobalScope::new(), "host", &SharedScope::new())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "load_container_shape");
    }
}
