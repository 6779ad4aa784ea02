//! # Remote containers and the container adapter.
//!
//! A remote's entry installs a [`RawContainer`] into the
//! [`GlobalScope`](crate::GlobalScope). Nothing about its shape is trusted:
//! [`ContainerHandle::adapt`] validates it (a `get` capability is mandatory,
//! `init` is optional) and [`ContainerHandle::initialize`] turns it into an
//! [`InitializedContainer`], the only type that can produce modules.
//!
//! ## Initialization
//! ```text
//! initialize(scope)
//!   ├─ no init          → ContainerInitSkipped, Ok
//!   └─ init(scope)      (runs at most once per container; concurrent callers await it)
//!        ├─ Ok          → ContainerInitialized
//!        ├─ Err(reason) → ContainerInitFailed, LoadError::ContainerInit
//!        └─ panic       → ContainerInitFailed, LoadError::ContainerInit
//! ```
//!
//! ## Rules
//! - The outcome of `init` is memoized on the container, so a later mount (or
//!   a retry) sees the same result without calling `init` again.
//! - No timeout is applied to `init`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::error::LoadError;
use crate::events::{Bus, Event, EventKind};

use super::module::Module;
use super::shared_scope::SharedScope;

/// Deferred module constructor returned by `get`.
pub type ModuleFactory = Box<dyn FnOnce() -> Result<Module, String> + Send>;

/// Container `init` capability.
pub type InitFn = Arc<dyn Fn(SharedScope) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Container `get` capability; `Ok(None)` means the path is not exposed.
pub type GetFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<ModuleFactory>, String>> + Send + Sync>;

type Producer = Arc<dyn Fn() -> Result<Module, String> + Send + Sync>;

/// Container as installed by a remote entry.
pub struct RawContainer {
    init: Option<InitFn>,
    get: Option<GetFn>,
    init_outcome: OnceCell<Result<(), String>>,
    init_calls: AtomicUsize,
}

impl RawContainer {
    /// Creates a container with neither capability.
    pub fn new() -> Self {
        Self {
            init: None,
            get: None,
            init_outcome: OnceCell::new(),
            init_calls: AtomicUsize::new(0),
        }
    }

    /// Starts a builder that derives `get` from a table of exposed paths.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Sets the `init` capability.
    pub fn with_init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SharedScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.init = Some(Arc::new(move |scope| f(scope).boxed()));
        self
    }

    /// Sets the `get` capability.
    pub fn with_get<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ModuleFactory>, String>> + Send + 'static,
    {
        self.get = Some(Arc::new(move |path| f(path).boxed()));
        self
    }

    /// True if the container has an `init` capability.
    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    /// True if the container has a `get` capability.
    pub fn has_get(&self) -> bool {
        self.get.is_some()
    }

    /// Number of times `init` has been invoked.
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// True once `init` has settled (or was skipped).
    pub fn is_initialized(&self) -> bool {
        matches!(self.init_outcome.get(), Some(Ok(())))
    }
}

impl Default for RawContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawContainer")
            .field("init", &self.init.is_some())
            .field("get", &self.get.is_some())
            .field("init_outcome", &self.init_outcome.get())
            .finish()
    }
}

/// Builds a [`RawContainer`] from a table of exposed paths.
#[derive(Default)]
pub struct ContainerBuilder {
    init: Option<InitFn>,
    modules: HashMap<String, Producer>,
}

impl ContainerBuilder {
    /// Sets the `init` capability.
    pub fn init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SharedScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.init = Some(Arc::new(move |scope| f(scope).boxed()));
        self
    }

    /// Exposes `path`; `produce` runs once per module request.
    pub fn expose<F>(mut self, path: impl Into<String>, produce: F) -> Self
    where
        F: Fn() -> Result<Module, String> + Send + Sync + 'static,
    {
        self.modules.insert(path.into(), Arc::new(produce));
        self
    }

    /// Exposes an already constructed module under `path`.
    pub fn expose_module(self, path: impl Into<String>, module: Module) -> Self {
        self.expose(path, move || Ok(module.clone()))
    }

    /// Finishes the container.
    pub fn build(self) -> RawContainer {
        let modules = Arc::new(self.modules);
        let container = RawContainer::new().with_get(move |path: String| {
            let producer = modules.get(&path).cloned();
            async move {
                Ok(producer.map(|p| -> ModuleFactory { Box::new(move || p()) }))
            }
        });
        RawContainer {
            init: self.init,
            ..container
        }
    }
}

/// A validated container.
#[derive(Clone)]
pub struct ContainerHandle {
    remote: Arc<str>,
    raw: Arc<RawContainer>,
    get: GetFn,
    bus: Option<Bus>,
}

impl ContainerHandle {
    /// Validates the shape of a container installed for `remote`.
    pub fn adapt(remote: &str, raw: Arc<RawContainer>) -> Result<Self, LoadError> {
        let get = raw.get.clone().ok_or_else(|| LoadError::ContainerShape {
            remote: remote.to_string(),
            reason: "container has no get capability".to_string(),
        })?;
        Ok(Self {
            remote: Arc::from(remote),
            raw,
            get,
            bus: None,
        })
    }

    /// Publishes init events on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Remote name.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Underlying container.
    pub fn raw(&self) -> &Arc<RawContainer> {
        &self.raw
    }

    /// Initializes the container against `scope`, at most once per container.
    pub async fn initialize(self, scope: &SharedScope) -> Result<InitializedContainer, LoadError> {
        let outcome = self
            .raw
            .init_outcome
            .get_or_init(|| self.run_init(scope.clone()))
            .await;

        match outcome {
            Ok(()) => Ok(InitializedContainer {
                remote: self.remote,
                get: self.get,
                bus: self.bus,
            }),
            Err(reason) => Err(LoadError::ContainerInit {
                remote: self.remote.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    async fn run_init(&self, scope: SharedScope) -> Result<(), String> {
        let Some(init) = self.raw.init.clone() else {
            tracing::debug!(remote = %self.remote, "container has no init; skipping");
            self.publish(Event::new(EventKind::ContainerInitSkipped).with_remote(&*self.remote));
            return Ok(());
        };

        self.raw.init_calls.fetch_add(1, Ordering::SeqCst);
        let fut = async move { init(scope).await };
        let outcome = match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic_err) => Err(format!(
                "init panicked: {}",
                crate::panic_message(panic_err.as_ref())
            )),
        };

        match &outcome {
            Ok(()) => {
                tracing::debug!(remote = %self.remote, "container initialized");
                self.publish(Event::new(EventKind::ContainerInitialized).with_remote(&*self.remote));
            }
            Err(reason) => {
                tracing::warn!(remote = %self.remote, %reason, "container init failed");
                self.publish(
                    Event::new(EventKind::ContainerInitFailed)
                        .with_remote(&*self.remote)
                        .with_reason(reason.as_str()),
                );
            }
        }
        outcome
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("remote", &self.remote)
            .field("raw", &self.raw)
            .finish()
    }
}

/// A container whose `init` has completed; the only source of modules.
#[derive(Clone)]
pub struct InitializedContainer {
    pub(super) remote: Arc<str>,
    pub(super) get: GetFn,
    pub(super) bus: Option<Bus>,
}

impl InitializedContainer {
    /// Remote name.
    pub fn remote(&self) -> &str {
        &self.remote
    }
}

impl fmt::Debug for InitializedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializedContainer")
            .field("remote", &self.remote)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn container_without_get_is_rejected() {
        let raw = Arc::new(RawContainer::new().with_init(|_| async { Ok(()) }));
        let err = ContainerHandle::adapt("toolA", raw).unwrap_err();
        assert_eq!(err.as_label(), "load_container_shape");
    }

    #[tokio::test(start_paused = true)]
    async fn init_runs_once_for_concurrent_callers() {
        let raw = Arc::new(
            RawContainer::builder()
                .init(|_| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                })
                .expose("./App", || Ok(Module::value(1u8)))
                .build(),
        );
        let scope = SharedScope::new();

        let a = ContainerHandle::adapt("toolA", raw.clone()).unwrap();
        let b = ContainerHandle::adapt("toolA", raw.clone()).unwrap();
        let (ra, rb) = tokio::join!(a.initialize(&scope), b.initialize(&scope));

        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(raw.init_calls(), 1);
        assert!(raw.is_initialized());
    }

    #[tokio::test]
    async fn init_failure_is_memoized() {
        let raw = Arc::new(
            RawContainer::builder()
                .init(|_| async { Err("scope rejected".to_string()) })
                .build(),
        );
        let scope = SharedScope::new();

        for _ in 0..2 {
            let err = ContainerHandle::adapt("toolA", raw.clone())
                .unwrap()
                .initialize(&scope)
                .await
                .unwrap_err();
            assert_eq!(
                err,
                LoadError::ContainerInit {
                    remote: "toolA".into(),
                    reason: "scope rejected".into()
                }
            );
        }
        assert_eq!(raw.init_calls(), 1);
    }

    #[tokio::test]
    async fn init_panic_becomes_load_error() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let raw = Arc::new(
            RawContainer::new()
                .with_init(|_| async { panic!("boom") })
                .with_get(|_| async { Ok(None) }),
        );
        let err = ContainerHandle::adapt("toolA", raw)
            .unwrap()
            .with_bus(bus)
            .initialize(&SharedScope::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("boom"));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ContainerInitFailed);
    }

    #[tokio::test]
    async fn missing_init_is_skipped() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let raw = Arc::new(RawContainer::builder().build());
        assert!(!raw.has_init());

        ContainerHandle::adapt("toolA", raw.clone())
            .unwrap()
            .with_bus(bus)
            .initialize(&SharedScope::new())
            .await
            .unwrap();

        assert_eq!(raw.init_calls(), 0);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ContainerInitSkipped);
    }
}
