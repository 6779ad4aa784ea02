//! # Linked remote entries.
//!
//! [`LinkedEntries`] is the [`ScriptHost`] used when remotes are compiled into
//! (or registered with) the host process. Each entry URL is linked to an
//! [`EntryPoint`]; loading the URL:
//!
//! 1. fetches the entry manifest from the URL (when a [`Fetch`] is configured),
//!    which proves the remote is deployed and reachable;
//! 2. checks that the manifest names the linked remote;
//! 3. compares the remote's shared declarations with the host's and logs drift;
//! 4. runs the entry point, which installs the container (immediately or later).
//!
//! ## Manifest
//! ```json
//! { "name": "toolA", "version": "1.4.0", "exposes": ["./App"],
//!   "shared": { "react": { "singleton": true, "requiredVersion": "^18.2.0" } } }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::page::GlobalScope;

use super::fetch::{Fetch, fetch_json};
use super::script::ScriptHost;
use super::shared_scope::{SharedDependency, check_declarations};

/// Document served at a remote's entry URL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryManifest {
    /// Remote name the entry registers under.
    pub name: String,
    /// Deployed version of the remote.
    #[serde(default)]
    pub version: String,
    /// Exposed paths.
    #[serde(default)]
    pub exposes: Vec<String>,
    /// Shared-dependency declarations of the remote.
    #[serde(default)]
    pub shared: BTreeMap<String, SharedDependency>,
}

/// Code executed when a remote's entry loads.
pub trait EntryPoint: Send + Sync + 'static {
    /// Remote name this entry installs.
    fn remote_name(&self) -> &str;

    /// Installs the container into `globals`.
    ///
    /// May install asynchronously (e.g. spawn a task); the resolver polls.
    fn install(&self, globals: &GlobalScope, manifest: &EntryManifest) -> Result<(), String>;
}

/// Entry point backed by a closure.
pub struct EntryFn<F> {
    remote: String,
    f: F,
}

impl<F> EntryFn<F>
where
    F: Fn(&GlobalScope, &EntryManifest) -> Result<(), String> + Send + Sync + 'static,
{
    /// Wraps an install closure for `remote`.
    pub fn new(remote: impl Into<String>, f: F) -> Self {
        Self {
            remote: remote.into(),
            f,
        }
    }
}

impl<F> EntryPoint for EntryFn<F>
where
    F: Fn(&GlobalScope, &EntryManifest) -> Result<(), String> + Send + Sync + 'static,
{
    fn remote_name(&self) -> &str {
        &self.remote
    }

    fn install(&self, globals: &GlobalScope, manifest: &EntryManifest) -> Result<(), String> {
        (self.f)(globals, manifest)
    }
}

/// [`ScriptHost`] resolving entry URLs to linked [`EntryPoint`]s.
pub struct LinkedEntries {
    fetch: Option<Arc<dyn Fetch>>,
    host_shared: BTreeMap<String, SharedDependency>,
    entries: RwLock<HashMap<String, Arc<dyn EntryPoint>>>,
    manifests: RwLock<HashMap<String, EntryManifest>>,
}

impl LinkedEntries {
    /// Entries that are executed without fetching a manifest.
    pub fn new() -> Self {
        Self {
            fetch: None,
            host_shared: BTreeMap::new(),
            entries: RwLock::new(HashMap::new()),
            manifests: RwLock::new(HashMap::new()),
        }
    }

    /// Entries whose manifest is fetched from the entry URL before execution.
    pub fn with_fetch(fetch: Arc<dyn Fetch>) -> Self {
        Self {
            fetch: Some(fetch),
            ..Self::new()
        }
    }

    /// Host declarations compared against each remote's manifest.
    pub fn with_host_shared(mut self, shared: BTreeMap<String, SharedDependency>) -> Self {
        self.host_shared = shared;
        self
    }

    /// Links `url` to `entry`, replacing any previous link.
    pub fn link(&self, url: impl Into<String>, entry: impl EntryPoint) -> &Self {
        self.entries.write().insert(url.into(), Arc::new(entry));
        self
    }

    /// Manifest of the last successful load of `remote`.
    pub fn manifest(&self, remote: &str) -> Option<EntryManifest> {
        self.manifests.read().get(remote).cloned()
    }
}

impl Default for LinkedEntries {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptHost for LinkedEntries {
    async fn load_script(&self, url: &str, globals: &GlobalScope) -> Result<(), String> {
        let fetched = match &self.fetch {
            Some(fetch) => Some(
                fetch_json::<EntryManifest>(fetch.as_ref(), url)
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            None => None,
        };

        let entry = self
            .entries
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| format!("no entry point linked for {url}"))?;

        let manifest = match fetched {
            Some(m) if m.name != entry.remote_name() => {
                return Err(format!(
                    "entry declares remote '{}', expected '{}'",
                    m.name,
                    entry.remote_name()
                ));
            }
            Some(m) => m,
            None => EntryManifest {
                name: entry.remote_name().to_string(),
                ..EntryManifest::default()
            },
        };

        for m in check_declarations(&self.host_shared, &manifest.shared) {
            tracing::warn!(
                remote = %manifest.name,
                package = %m.package,
                host = %m.host_required,
                declared = %m.remote_required,
                "shared singleton declared with a different requirement"
            );
        }

        entry.install(globals, &manifest)?;
        self.manifests
            .write()
            .insert(manifest.name.clone(), manifest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::loader::{RawContainer, StaticFetcher};

    const URL: &str = "http://localhost:4001/remoteEntry.js";

    fn tool_a() -> impl EntryPoint {
        EntryFn::new("toolA", |globals: &GlobalScope, _: &EntryManifest| {
            globals.install("toolA", RawContainer::builder().build());
            Ok(())
        })
    }

    #[tokio::test]
    async fn linked_entry_installs_container() {
        let entries = LinkedEntries::new();
        entries.link(URL, tool_a());
        let globals = GlobalScope::new();

        entries.load_script(URL, &globals).await.unwrap();
        assert!(globals.contains("toolA"));
        assert_eq!(entries.manifest("toolA").unwrap().name, "toolA");
    }

    #[tokio::test]
    async fn unreachable_entry_fails_before_execution() {
        let entries = LinkedEntries::with_fetch(Arc::new(StaticFetcher::new()));
        entries.link(URL, tool_a());
        let globals = GlobalScope::new();

        let err = entries.load_script(URL, &globals).await.unwrap_err();
        assert!(err.contains(URL));
        assert!(!globals.contains("toolA"));
    }

    #[tokio::test]
    async fn manifest_must_name_linked_remote() {
        let fetch = Arc::new(StaticFetcher::new());
        fetch.serve_json(URL, &json!({ "name": "toolB", "version": "1.0.0" }));
        let entries = LinkedEntries::with_fetch(fetch);
        entries.link(URL, tool_a());

        let err = entries.load_script(URL, &GlobalScope::new()).await.unwrap_err();
        assert!(err.contains("toolB"));
    }

    #[tokio::test]
    async fn unlinked_url_is_an_error() {
        let entries = LinkedEntries::new();
        let err = entries
            .load_script("http://localhost:4009/remoteEntry.js", &GlobalScope::new())
            .await
            .unwrap_err();
        assert!(err.contains("no entry point"));
    }
}
