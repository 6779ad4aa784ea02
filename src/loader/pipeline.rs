//! # Load sequence.
//!
//! [`RemoteLoader`] chains the four steps that bring one exposed module of a
//! remote into the host:
//!
//! ```text
//! LoadingScript ─► AwaitingContainer ─► Initializing ─► FetchingModule ─► Module
//!      │                  │                  │                │
//!      └──────────────────┴──── LoadError ───┴────────────────┘
//! ```
//!
//! Each step is async and fallible. The caller observes progress through the
//! `on_phase` callback, invoked before each step starts.

use std::sync::Arc;

use crate::error::LoadError;
use crate::events::Bus;
use crate::registry::RemoteDescriptor;

use super::container::InitializedContainer;
use super::module::Module;
use super::resolver::{ContainerResolver, PollBudget};
use super::script::ScriptLoader;
use super::shared_scope::SharedScope;

/// Step of the load sequence currently running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadPhase {
    /// Fetching and executing the entry script.
    LoadingScript,
    /// Polling for the container.
    AwaitingContainer,
    /// Running the container's `init`.
    Initializing,
    /// Requesting the exposed module and invoking its factory.
    FetchingModule,
}

impl LoadPhase {
    /// Returns a short stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadPhase::LoadingScript => "loading_script",
            LoadPhase::AwaitingContainer => "awaiting_container",
            LoadPhase::Initializing => "initializing",
            LoadPhase::FetchingModule => "fetching_module",
        }
    }

    /// Error raised when this phase fails for a reason outside its own
    /// contract (e.g. a panic).
    pub fn failure(&self, descriptor: &RemoteDescriptor, path: &str, reason: String) -> LoadError {
        let remote = descriptor.remote_name.clone();
        match self {
            LoadPhase::LoadingScript => LoadError::ScriptLoad {
                remote,
                url: descriptor.entry_url(),
                reason,
            },
            LoadPhase::AwaitingContainer => LoadError::ContainerShape { remote, reason },
            LoadPhase::Initializing => LoadError::ContainerInit { remote, reason },
            LoadPhase::FetchingModule => LoadError::ModuleFetch {
                remote,
                path: path.to_string(),
                reason,
            },
        }
    }
}

/// Runs load sequences against one page.
#[derive(Clone)]
pub struct RemoteLoader {
    scripts: ScriptLoader,
    resolver: ContainerResolver,
    scope: SharedScope,
    budget: PollBudget,
}

impl RemoteLoader {
    /// Creates a loader.
    pub fn new(
        scripts: ScriptLoader,
        resolver: ContainerResolver,
        scope: SharedScope,
        budget: PollBudget,
    ) -> Self {
        Self {
            scripts,
            resolver,
            scope,
            budget,
        }
    }

    /// Loads and initializes the container of `descriptor`.
    pub async fn load_container<F>(
        &self,
        descriptor: &RemoteDescriptor,
        on_phase: &mut F,
    ) -> Result<InitializedContainer, LoadError>
    where
        F: FnMut(LoadPhase) + Send,
    {
        let remote = descriptor.remote_name.as_str();
        let url = descriptor.entry_url();

        on_phase(LoadPhase::LoadingScript);
        self.scripts.load_remote_script(remote, &url).await?;

        on_phase(LoadPhase::AwaitingContainer);
        let handle = self.resolver.await_container(remote, &url, self.budget).await?;

        on_phase(LoadPhase::Initializing);
        handle.initialize(&self.scope).await
    }

    /// Runs the full sequence for the module exposed at `path`.
    pub async fn load_module<F>(
        &self,
        descriptor: &RemoteDescriptor,
        path: &str,
        mut on_phase: F,
    ) -> Result<Module, LoadError>
    where
        F: FnMut(LoadPhase) + Send,
    {
        let container = self.load_container(descriptor, &mut on_phase).await?;
        on_phase(LoadPhase::FetchingModule);
        container.get_exposed_module(path).await
    }

    /// Shared scope passed to every container.
    pub fn scope(&self) -> &SharedScope {
        &self.scope
    }

    /// Poll budget used by the resolver.
    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Builds a loader from its parts, all publishing on `bus`.
    pub(crate) fn assemble(
        document: Arc<crate::page::Document>,
        globals: crate::page::GlobalScope,
        host: Arc<dyn super::script::ScriptHost>,
        scope: SharedScope,
        budget: PollBudget,
        bus: Bus,
    ) -> Self {
        Self::new(
            ScriptLoader::new(document, globals.clone(), host, bus.clone()),
            ContainerResolver::new(globals, bus),
            scope,
            budget,
        )
    }
}
