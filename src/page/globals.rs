//! # Global scope.
//!
//! Process-wide registry keyed by remote name. It replaces ad hoc global
//! lookups with one explicit contract:
//! - **single writer**: the remote's own entry installs its container;
//! - **single reader**: the [`ContainerResolver`](crate::ContainerResolver)
//!   polls for it.
//!
//! The host's export container is installed here too, under
//! [`HostConfig::exports_name`](crate::HostConfig::exports_name).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::loader::RawContainer;

/// Registry of installed containers.
#[derive(Clone, Default)]
pub struct GlobalScope {
    inner: Arc<RwLock<HashMap<String, Arc<RawContainer>>>>,
}

impl GlobalScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a container under `name`, returning the one it replaced.
    pub fn install(&self, name: impl Into<String>, container: RawContainer) -> Option<Arc<RawContainer>> {
        self.inner.write().insert(name.into(), Arc::new(container))
    }

    /// Container registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Arc<RawContainer>> {
        self.inner.read().get(name).cloned()
    }

    /// True if a container is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Removes the container registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<RawContainer>> {
        self.inner.write().remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for GlobalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalScope")
            .field("names", &self.names())
            .finish()
    }
}
