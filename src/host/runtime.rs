//! # Host: owns the page, the registry and every mount.
//!
//! The [`Host`] owns the event bus, a [`SubscriberSet`], the page resources
//! ([`Document`], [`GlobalScope`]), the [`SharedScope`] and the remote
//! registry. It hands out [`MountBoundary`]s, one per slot.
//!
//! ## High-level architecture
//! ```text
//! Host::mount(remote, module)
//!   registry.get(remote) ─► descriptor.exposed_path(module)
//!         └──► MountBoundary::new(ctx, descriptor) ─► start()
//!                    │
//!                    ├─ StylesheetInjector::ensure_remote_stylesheet   (fire-and-forget)
//!                    └─ tokio::spawn(RemoteLoader::load_module)
//!                          ScriptLoader ─► ContainerResolver ─► ContainerHandle::initialize
//!                                                           ─► get_exposed_module
//!
//! Event flow:
//!   loaders / mounts ── publish(Event) ──► Bus ──► host listener ──► SubscriberSet::emit(&Event)
//!                                                                  ┌──────────┬──────────┐
//!                                                                  ▼          ▼          ▼
//!                                                             LogWriter  RemoteStatus  custom
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tooldock::{
//!     EntryFn, GlobalScope, Host, HostConfig, LinkedEntries, RawContainer, Module, ComponentFn,
//!     RemoteDescriptor, RemoteRegistry, SlotView,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let entries = Arc::new(LinkedEntries::new());
//!     entries.link("http://localhost:4001/remoteEntry.js", EntryFn::new("toolA", |g: &GlobalScope, _: &_| {
//!         g.install("toolA", RawContainer::builder()
//!             .expose("./App", || Ok(Module::component(ComponentFn::new("App", |_| Ok("<p>toolA</p>".into())))))
//!             .build());
//!         Ok(())
//!     }));
//!
//!     let registry = RemoteRegistry::new([
//!         RemoteDescriptor::new("toolA", "http://localhost:4001").expose("main", "./App"),
//!     ])?;
//!     let host = Host::builder(HostConfig::default())
//!         .with_registry(registry)
//!         .with_script_host(entries)
//!         .build()?;
//!
//!     let mount = host.mount("toolA", "main")?;
//!     mount.settled().await;
//!     assert_eq!(mount.render(&serde_json::json!({})), SlotView::Rendered("<p>toolA</p>".into()));
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{
    config::HostConfig,
    error::{LoadError, MountError},
    events::{Bus, Event},
    exports::HostImports,
    loader::{RemoteLoader, SharedScope},
    mount::{MountBoundary, MountContext},
    page::{Document, GlobalScope},
    registry::{RemoteDescriptor, RemoteRegistry, ToolRecord, is_valid_remote_name},
    subscribers::{RemoteStatusTracker, SubscriberSet},
};

use super::builder::HostBuilder;

/// Composition runtime for one page.
pub struct Host {
    cfg: HostConfig,
    registry: RemoteRegistry,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    status: Arc<RemoteStatusTracker>,
    document: Arc<Document>,
    globals: GlobalScope,
    scope: SharedScope,
    ctx: MountContext,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Host {
    /// Starts building a host.
    pub fn builder(cfg: HostConfig) -> HostBuilder {
        HostBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn new_internal(
        cfg: HostConfig,
        registry: RemoteRegistry,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        status: Arc<RemoteStatusTracker>,
        document: Arc<Document>,
        globals: GlobalScope,
        scope: SharedScope,
        ctx: MountContext,
    ) -> Self {
        Self {
            cfg,
            registry,
            bus,
            subs,
            status,
            document,
            globals,
            scope,
            ctx,
            listener: Mutex::new(None),
        }
    }

    /// Forwards bus events to the subscriber set.
    pub(super) fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(old) = self.listener.lock().replace(handle) {
            old.abort();
        }
    }

    /// Mounts module `module_id` of the registered remote `remote` and starts loading it.
    pub fn mount(&self, remote: &str, module_id: &str) -> Result<MountBoundary, MountError> {
        let descriptor = self
            .registry
            .get(remote)
            .cloned()
            .ok_or_else(|| MountError::UnknownRemote {
                remote: remote.to_string(),
            })?;
        self.mount_descriptor(descriptor, module_id)
    }

    /// Mounts module `module_id` of an arbitrary descriptor and starts loading it.
    pub fn mount_descriptor(
        &self,
        descriptor: RemoteDescriptor,
        module_id: &str,
    ) -> Result<MountBoundary, MountError> {
        if !is_valid_remote_name(&descriptor.remote_name)
            || descriptor.remote_name == self.cfg.exports_name
        {
            return Err(MountError::InvalidRemote {
                remote: descriptor.remote_name,
            });
        }
        let path = descriptor
            .exposed_path(module_id)
            .map(str::to_string)
            .ok_or_else(|| MountError::UnknownModule {
                remote: descriptor.remote_name.clone(),
                module: module_id.to_string(),
            })?;
        let mount = MountBoundary::new(self.ctx.clone(), descriptor, module_id.to_string(), path);
        mount.start();
        Ok(mount)
    }

    /// Mounts the main module of a tool registry record.
    pub fn mount_tool(&self, tool: &ToolRecord) -> Result<MountBoundary, MountError> {
        self.mount_descriptor(tool.to_descriptor(), "main")
    }

    /// Resolves the host exports as a remote would.
    pub async fn imports(&self) -> Result<HostImports, LoadError> {
        HostImports::resolve(&self.globals, &self.cfg.exports_name, &self.scope).await
    }

    /// Publishes an event on the host bus.
    pub fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// Receiver for every event published on the host bus.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Configuration the host was built with.
    pub fn config(&self) -> &HostConfig {
        &self.cfg
    }

    /// Registered remotes.
    pub fn registry(&self) -> &RemoteRegistry {
        &self.registry
    }

    /// Page document.
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Global container registry.
    pub fn globals(&self) -> &GlobalScope {
        &self.globals
    }

    /// Shared-dependency scope passed to every container.
    pub fn shared_scope(&self) -> &SharedScope {
        &self.scope
    }

    /// Per-remote status derived from events.
    pub fn status(&self) -> &Arc<RemoteStatusTracker> {
        &self.status
    }

    /// Load sequence runner.
    pub fn loader(&self) -> &RemoteLoader {
        &self.ctx.loader
    }

    /// Stops forwarding events to subscribers.
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("environment", &self.cfg.environment)
            .field("remotes", &self.registry.names())
            .field("subscribers", &self.subs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::loader::LinkedEntries;

    fn host() -> Arc<Host> {
        let registry = RemoteRegistry::new([
            RemoteDescriptor::new("toolA", "http://localhost:4001").expose("main", "./App"),
        ])
        .unwrap();
        Host::builder(HostConfig::default())
            .with_registry(registry)
            .with_script_host(Arc::new(LinkedEntries::new()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_remote_and_module_are_rejected() {
        let host = host();
        assert_eq!(
            host.mount("toolZ", "main").unwrap_err(),
            MountError::UnknownRemote { remote: "toolZ".into() }
        );
        assert_eq!(
            host.mount("toolA", "settings").unwrap_err().as_label(),
            "mount_unknown_module"
        );
    }

    #[tokio::test]
    async fn unvalidated_descriptors_are_rejected() {
        let host = host();
        let bad = RemoteDescriptor::new("tool-a", "http://localhost:4001").expose("main", "./App");
        assert_eq!(
            host.mount_descriptor(bad, "main").unwrap_err(),
            MountError::InvalidRemote { remote: "tool-a".into() }
        );

        let shadow = RemoteDescriptor::new("host", "http://localhost:4009").expose("main", "./App");
        assert_eq!(
            host.mount_descriptor(shadow, "main").unwrap_err().as_label(),
            "mount_invalid_remote"
        );
    }

    #[tokio::test]
    async fn remote_may_not_take_the_exports_key() {
        let registry = RemoteRegistry::new([
            RemoteDescriptor::new("host", "http://localhost:4009").expose("main", "./App"),
        ])
        .unwrap();
        let err = Host::builder(HostConfig::default())
            .with_registry(registry)
            .with_script_host(Arc::new(LinkedEntries::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName { name } if name == "host"));
    }

    #[tokio::test]
    async fn exports_name_must_be_an_identifier() {
        let cfg = HostConfig {
            exports_name: "host-exports".into(),
            ..HostConfig::default()
        };
        let err = Host::builder(cfg)
            .with_script_host(Arc::new(LinkedEntries::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_remote_name");
    }

    #[tokio::test]
    async fn missing_exports_are_a_load_error() {
        let host = host();
        assert!(host.imports().await.is_err());
    }
}
