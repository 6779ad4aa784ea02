use std::sync::Arc;

use crate::{
    config::HostConfig,
    error::ConfigError,
    events::Bus,
    exports::HostExports,
    loader::{
        Fetch, LinkedEntries, RemoteLoader, ScriptHost, SharedScope, StylesheetInjector,
    },
    mount::MountContext,
    page::{Document, GlobalScope},
    registry::{RemoteRegistry, is_valid_remote_name},
    subscribers::{RemoteStatusTracker, Subscribe, SubscriberSet},
};

use super::runtime::Host;

/// Builder for constructing a [`Host`] with optional collaborators.
pub struct HostBuilder {
    cfg: HostConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    script_host: Option<Arc<dyn ScriptHost>>,
    fetch: Option<Arc<dyn Fetch>>,
    registry: Option<RemoteRegistry>,
    exports: Option<HostExports>,
}

impl HostBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: HostConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            script_host: None,
            fetch: None,
            registry: None,
            exports: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// A [`RemoteStatusTracker`] is always added.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the host that executes remote entries.
    ///
    /// Defaults to an empty [`LinkedEntries`] fetching manifests through the
    /// configured [`Fetch`].
    pub fn with_script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    /// Sets the fetcher used for entry and asset manifests.
    ///
    /// Defaults to `HttpFetcher` with the `http` feature, otherwise to an empty
    /// [`StaticFetcher`](crate::StaticFetcher).
    pub fn with_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Uses `registry` instead of building one from the configuration.
    pub fn with_registry(mut self, registry: RemoteRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Installs `exports` under `cfg.exports_name`.
    pub fn with_exports(mut self, exports: HostExports) -> Self {
        self.exports = Some(exports);
        self
    }

    /// Builds the host.
    ///
    /// Fails if `cfg.exports_name` is not an identifier or is also the name of
    /// a registered remote.
    ///
    /// Must be called from within a tokio runtime (subscriber workers and the
    /// bus listener are spawned here).
    pub fn build(self) -> Result<Arc<Host>, ConfigError> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => RemoteRegistry::from_config(&self.cfg)?,
        };
        if !is_valid_remote_name(&self.cfg.exports_name) {
            return Err(ConfigError::InvalidRemoteName {
                name: self.cfg.exports_name.clone(),
            });
        }
        if registry.get(&self.cfg.exports_name).is_some() {
            return Err(ConfigError::ReservedName {
                name: self.cfg.exports_name.clone(),
            });
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let status = Arc::new(RemoteStatusTracker::new());
        let mut subscribers = self.subscribers;
        subscribers.push(status.clone());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));

        let fetch = self.fetch.unwrap_or_else(default_fetch);
        let script_host: Arc<dyn ScriptHost> = match self.script_host {
            Some(host) => host,
            None => Arc::new(
                LinkedEntries::with_fetch(Arc::clone(&fetch))
                    .with_host_shared(self.cfg.shared.clone()),
            ),
        };

        let document = Arc::new(Document::new());
        let globals = GlobalScope::new();
        let scope = SharedScope::with_bus(bus.clone());

        if let Some(exports) = self.exports {
            tracing::debug!(name = %self.cfg.exports_name, "installing host exports");
            globals.install(self.cfg.exports_name.clone(), exports.into_container());
        }

        let loader = RemoteLoader::assemble(
            Arc::clone(&document),
            globals.clone(),
            script_host,
            scope.clone(),
            self.cfg.poll_budget(),
            bus.clone(),
        );
        let styles = StylesheetInjector::new(Arc::clone(&document), fetch, bus.clone());

        let ctx = MountContext {
            loader,
            styles,
            bus: bus.clone(),
        };
        let host = Arc::new(Host::new_internal(
            self.cfg, registry, bus, subs, status, document, globals, scope, ctx,
        ));
        host.subscriber_listener();
        Ok(host)
    }
}

#[cfg(feature = "http")]
fn default_fetch() -> Arc<dyn Fetch> {
    Arc::new(crate::loader::HttpFetcher::new())
}

#[cfg(not(feature = "http"))]
fn default_fetch() -> Arc<dyn Fetch> {
    Arc::new(crate::loader::StaticFetcher::new())
}
