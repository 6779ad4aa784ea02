//! # tooldock
//!
//! **Tooldock** composes independently deployed tool remotes into a single
//! host shell at runtime.
//!
//! Each remote publishes an entry script that registers a *container* on the
//! page's global scope. The host injects the script, waits for the container,
//! initializes it with a shared-dependency scope and asks it for an exposed
//! module. Every slot is isolated: one remote failing to load or render never
//! takes down its siblings.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  descriptor  │   │  descriptor  │   │  ToolRecord  │
//!     │   (toolA)    │   │   (toolB)    │   │  (registry)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Host (composition runtime)                                       │
//! │  - Bus (broadcast events)                                         │
//! │  - Document + GlobalScope (page resources)                        │
//! │  - SharedScope (singleton dependencies)                           │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ MountBoundary│   │ MountBoundary│   │ MountBoundary│   │
//!     │ (load+render)│   │ (load+render)│   │ (load+render)│   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ Publishes:       │                  │                 │
//!      │ - ScriptInjected │ - MountReady     │ - MountFailed   │
//!      │ - ContainerInit. │ - RenderFailed   │ - ...           │
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                  (capacity: HostConfig::bus_capacity)             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │        (in Host)       │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!               RemoteStatus   LogWriter   custom
//! ```
//!
//! ### Load sequence
//! ```text
//! MountBoundary::start()
//!   ├─► Loading(LoadingScript)     ScriptLoader: reuse or inject <script>, run entry
//!   ├─► Loading(AwaitingContainer) ContainerResolver: poll GlobalScope (50 × 100ms)
//!   ├─► Loading(Initializing)      ContainerHandle::initialize(shared scope), once per container
//!   ├─► Loading(FetchingModule)    get(path) ─► factory() ─► Module
//!   │
//!   ├─ Ok  ──► Ready   ─► render(props) behind a RenderGuard
//!   └─ Err ──► Failed{stage, message} ─► retry() starts a fresh attempt
//!
//! unmount(): cancels continuations, removes the stylesheet it injected
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Loading**       | Script, container, init and module stages with typed errors. | [`RemoteLoader`], [`LoadError`]            |
//! | **Mounting**      | Per-slot state machine, fallbacks, render isolation.         | [`MountBoundary`], [`SlotView`]            |
//! | **Sharing**       | Singleton dependency negotiation between host and remotes.   | [`SharedScope`], [`VersionReq`]            |
//! | **Host exports**  | Auth, tenant-scoped data and realtime shared with remotes.   | [`HostExports`], [`HostImports`]           |
//! | **Subscriber API**| Hook into load and mount events.                             | [`Subscribe`], [`RemoteStatusTracker`]     |
//! | **Configuration** | Remotes per environment, poll budget, bus capacity.          | [`HostConfig`], [`RemoteRegistry`]         |
//!
//! ## Optional features
//! - `http` (default): [`HttpFetcher`] for entry and asset manifests.
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tooldock::{
//!     ComponentFn, EntryFn, GlobalScope, Host, HostConfig, LinkedEntries, Module, RawContainer,
//!     RemoteDescriptor, RemoteRegistry, SlotView, StaticFetcher,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Entry scripts are executed by a ScriptHost; LinkedEntries runs them in-process.
//!     let entries = Arc::new(LinkedEntries::new());
//!     entries.link("http://localhost:4002/remoteEntry.js", EntryFn::new("toolB", |g: &GlobalScope, _: &_| {
//!         g.install("toolB", RawContainer::builder()
//!             .init(|_scope| async { Ok(()) })
//!             .expose("./Widget", || {
//!                 Ok(Module::component(ComponentFn::new("Widget", |props| {
//!                     Ok(format!("<b>{}</b>", props["title"].as_str().unwrap_or("untitled")))
//!                 })))
//!             })
//!             .build());
//!         Ok(())
//!     }));
//!
//!     let registry = RemoteRegistry::new([
//!         RemoteDescriptor::new("toolB", "http://localhost:4002").expose("widget", "./Widget"),
//!     ])?;
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn tooldock::Subscribe>> = vec![Arc::new(tooldock::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn tooldock::Subscribe>> = Vec::new();
//!
//!     let host = Host::builder(HostConfig::default())
//!         .with_subscribers(subs)
//!         .with_registry(registry)
//!         .with_script_host(entries)
//!         .with_fetch(Arc::new(StaticFetcher::new()))
//!         .build()?;
//!
//!     let mount = host.mount("toolB", "widget")?;
//!     assert!(mount.settled().await.is_ready());
//!     assert_eq!(
//!         mount.render(&serde_json::json!({ "title": "Orders" })),
//!         SlotView::Rendered("<b>Orders</b>".into()),
//!     );
//!     mount.unmount();
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod events;
mod exports;
mod host;
mod loader;
mod mount;
mod page;
mod registry;
mod subscribers;

// ---- Public re-exports ----

pub use config::{Environment, HostConfig, RealtimeConfig, RemoteConfig};
pub use error::{
    AccessError, ConfigError, FetchError, LoadError, LoadStage, MountError, RealtimeError,
    RenderError, SharedScopeError,
};
pub use events::{Bus, Event, EventKind};
pub use exports::{
    AUTH_PATH, Ack, AuthAccessor, AuthContext, ClientHandle, DATA_PATH, DocumentStore, Envelope,
    Filter, HostExports, HostImports, ListenerId, LoopbackTransport, MemoryStore, Principal,
    REALTIME_PATH, RealtimeClient, RealtimeConnection, RealtimeTransport, Record, ServerHandler,
    StoredRecord, TENANT_FIELD, TenantRepository,
};
pub use host::{Host, HostBuilder};
pub use loader::{
    Component, ComponentFn, ContainerBuilder, ContainerHandle, ContainerResolver,
    DeclarationMismatch, EntryFn, EntryManifest, EntryPoint, Fetch, GetFn, InitFn,
    InitializedContainer, LinkedEntries, LoadPhase, Module, ModuleFactory, PollBudget, Props,
    ProvidedVersion, RawContainer, RemoteLoader, RenderResult, ScriptHost, ScriptLoader,
    SharedDependency, SharedPackageReport, SharedScope, SharedValue, StaticFetcher,
    StylesheetInjector, Version, VersionReq, View, check_declarations, fetch_json,
    get_exposed_module,
};
pub use mount::{MountBoundary, MountFailure, MountId, MountState, RenderGuard, SlotView};
pub use page::{Document, Element, GlobalScope, StylesheetRecord};
pub use registry::{RemoteDescriptor, RemoteRegistry, Role, ToolRecord, ToolStatus, is_valid_remote_name};
pub use subscribers::{RemoteStatus, RemoteStatusTracker, Subscribe, SubscriberSet};

// Optional: HTTP fetcher backed by reqwest.
// Enable with: `--features http` (default)
#[cfg(feature = "http")]
pub use loader::HttpFetcher;

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
