//! # Mount boundary.
//!
//! A [`MountBoundary`] places one exposed module of one remote into a host
//! slot. It owns the load attempt, the render guard and the remote's
//! stylesheet, and keeps every failure inside its own slot.
//!
//! ## Lifecycle
//! ```text
//!   Idle ── start() ──► Loading(phase) ──► Ready ──► render() ─► Rendered | RenderFailed
//!                             │                                               │
//!                             ▼                                        reset_render()
//!                          Failed ── retry() ──► Loading(LoadingScript)
//!
//!   any state ── unmount()/drop ──► Unmounted (liveness cancelled)
//! ```
//!
//! ## Rules
//! - Every continuation of the load task checks liveness before applying a
//!   state; a result arriving after unmount is discarded.
//! - `Failed` is terminal until `retry()`; nothing retries automatically.
//! - A panic anywhere in the load task becomes `Failed` for the phase it
//!   happened in.
//! - Only this mount can remove the stylesheet it inserted.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::MountError;
use crate::events::{Bus, Event, EventKind};
use crate::loader::{LoadPhase, Module, Props, RemoteLoader, StylesheetInjector};
use crate::registry::RemoteDescriptor;

use super::guard::RenderGuard;
use super::state::{MountFailure, MountId, MountState, SlotView};

/// Collaborators shared by every mount of one host.
#[derive(Clone)]
pub(crate) struct MountContext {
    pub(crate) loader: RemoteLoader,
    pub(crate) styles: StylesheetInjector,
    pub(crate) bus: Bus,
}

struct Inner {
    id: MountId,
    descriptor: RemoteDescriptor,
    module_id: String,
    path: String,
    ctx: MountContext,
    state: watch::Sender<MountState>,
    module: Mutex<Option<Module>>,
    guard: Mutex<RenderGuard>,
    liveness: CancellationToken,
    attempts: Mutex<u32>,
}

impl Inner {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_mount(self.id.raw())
            .with_remote(self.descriptor.remote_name.as_str())
            .with_module(self.module_id.as_str())
    }

    fn is_live(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    /// Applies `next` if the mount is still live.
    fn apply(&self, next: MountState) -> bool {
        if !self.is_live() {
            return false;
        }
        self.state.send_replace(next);
        true
    }
}

/// One remote module mounted into one host slot.
///
/// Dropping the boundary unmounts it.
pub struct MountBoundary {
    inner: Arc<Inner>,
}

impl MountBoundary {
    pub(crate) fn new(
        ctx: MountContext,
        descriptor: RemoteDescriptor,
        module_id: String,
        path: String,
    ) -> Self {
        let guard = RenderGuard::new(descriptor.remote_name.clone(), module_id.clone());
        let (state, _) = watch::channel(MountState::Idle);
        Self {
            inner: Arc::new(Inner {
                id: MountId::next(),
                descriptor,
                module_id,
                path,
                ctx,
                state,
                module: Mutex::new(None),
                guard: Mutex::new(guard),
                liveness: CancellationToken::new(),
                attempts: Mutex::new(0),
            }),
        }
    }

    /// Mount identity.
    pub fn id(&self) -> MountId {
        self.inner.id
    }

    /// Remote name.
    pub fn remote(&self) -> &str {
        &self.inner.descriptor.remote_name
    }

    /// Logical module id.
    pub fn module_id(&self) -> &str {
        &self.inner.module_id
    }

    /// Exposed path requested from the container.
    pub fn exposed_path(&self) -> &str {
        &self.inner.path
    }

    /// Current state.
    pub fn state(&self) -> MountState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<MountState> {
        self.inner.state.subscribe()
    }

    /// Number of load attempts started.
    pub fn attempts(&self) -> u32 {
        *self.inner.attempts.lock()
    }

    /// True until unmounted.
    pub fn is_mounted(&self) -> bool {
        self.inner.is_live()
    }

    /// Starts the load sequence. No-op unless `Idle`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if matches!(*self.inner.state.borrow(), MountState::Idle) {
            self.launch();
        }
    }

    /// Starts a fresh attempt from `Failed`.
    ///
    /// The `Failed -> Loading` transition is claimed under the state lock, so
    /// of two racing calls exactly one launches an attempt.
    pub fn retry(&self) -> Result<(), MountError> {
        let inner = &self.inner;
        let claimed = inner.is_live()
            && inner.state.send_if_modified(|state| {
                if !matches!(state, MountState::Failed(_)) {
                    return false;
                }
                *state = MountState::Loading(LoadPhase::LoadingScript);
                true
            });
        if !claimed {
            return Err(MountError::NotFailed);
        }
        self.launch();
        Ok(())
    }

    fn launch(&self) {
        let inner = &self.inner;
        if !inner.is_live() {
            return;
        }
        let attempt = {
            let mut attempts = inner.attempts.lock();
            *attempts += 1;
            *attempts
        };
        inner.apply(MountState::Loading(LoadPhase::LoadingScript));
        tracing::debug!(mount = %inner.id, remote = %inner.descriptor.remote_name, attempt, "mount started");
        inner
            .ctx
            .bus
            .publish(inner.event(EventKind::MountStarted).with_attempt(attempt));

        inner.ctx.styles.ensure_remote_stylesheet(
            &inner.descriptor.remote_name,
            inner.descriptor.origin(),
            inner.id,
            inner.liveness.clone(),
        );

        let task = Arc::clone(inner);
        tokio::spawn(async move { run_attempt(task).await });
    }

    /// Renders the slot for `props`.
    pub fn render(&self, props: &Props) -> SlotView {
        let inner = &self.inner;
        if !inner.is_live() {
            return SlotView::Unmounted;
        }
        let state = inner.state.borrow().clone();
        match state {
            MountState::Idle => SlotView::Idle,
            MountState::Loading(phase) => SlotView::Loading(phase),
            MountState::Failed(failure) => SlotView::Failed(failure),
            MountState::Ready => {
                let Some(module) = inner.module.lock().clone() else {
                    return SlotView::Idle;
                };
                let Some(component) = module.as_component() else {
                    let err = crate::error::RenderError {
                        remote: inner.descriptor.remote_name.clone(),
                        module: inner.module_id.clone(),
                        reason: "exposed module is not a component".to_string(),
                    };
                    return SlotView::RenderFailed(err);
                };
                match inner.guard.lock().render(component.as_ref(), props) {
                    Ok(view) => SlotView::Rendered(view),
                    Err((err, fresh)) => {
                        if fresh {
                            tracing::warn!(mount = %inner.id, remote = %err.remote, reason = %err.reason, "remote render failed");
                            inner.ctx.bus.publish(
                                inner
                                    .event(EventKind::RenderFailed)
                                    .with_reason(err.reason.as_str()),
                            );
                        }
                        SlotView::RenderFailed(err)
                    }
                }
            }
        }
    }

    /// Clears a render failure so the next `render` runs the component again.
    pub fn reset_render(&self) -> bool {
        let reset = self.inner.guard.lock().reset();
        if reset {
            self.inner
                .ctx
                .bus
                .publish(self.inner.event(EventKind::RenderReset));
        }
        reset
    }

    /// The loaded module, once `Ready`.
    pub fn module(&self) -> Option<Module> {
        self.inner.module.lock().clone()
    }

    /// Waits until the mount is `Ready` or `Failed`, or unmounted.
    pub async fn settled(&self) -> MountState {
        let mut rx = self.inner.state.subscribe();
        let settled = async move {
            rx.wait_for(MountState::is_settled)
                .await
                .map(|state| state.clone())
        };
        tokio::select! {
            res = settled => res.unwrap_or_else(|_| self.state()),
            _ = self.inner.liveness.cancelled() => self.state(),
        }
    }

    /// Tears the mount down: cancels liveness and removes the stylesheet it owns.
    ///
    /// Idempotent.
    pub fn unmount(&self) {
        let inner = &self.inner;
        if !inner.is_live() {
            return;
        }
        inner.liveness.cancel();
        inner
            .ctx
            .styles
            .remove(&inner.descriptor.remote_name, inner.id);
        tracing::debug!(mount = %inner.id, remote = %inner.descriptor.remote_name, "unmounted");
        inner.ctx.bus.publish(inner.event(EventKind::MountUnmounted));
    }
}

impl Drop for MountBoundary {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl std::fmt::Debug for MountBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountBoundary")
            .field("id", &self.inner.id)
            .field("remote", &self.inner.descriptor.remote_name)
            .field("module", &self.inner.module_id)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

async fn run_attempt(inner: Arc<Inner>) {
    let started = Instant::now();
    let phase = Arc::new(Mutex::new(LoadPhase::LoadingScript));

    let outcome = {
        let observer = Arc::clone(&inner);
        let current = Arc::clone(&phase);
        let load = inner
            .ctx
            .loader
            .load_module(&inner.descriptor, &inner.path, move |p| {
                *current.lock() = p;
                observer.apply(MountState::Loading(p));
            });
        match std::panic::AssertUnwindSafe(load).catch_unwind().await {
            Ok(res) => res,
            Err(panic_err) => {
                let reason = format!("panicked: {}", crate::panic_message(panic_err.as_ref()));
                let failed_in = *phase.lock();
                Err(failed_in.failure(&inner.descriptor, &inner.path, reason))
            }
        }
    };

    if !inner.is_live() {
        tracing::debug!(mount = %inner.id, "load settled after unmount; discarded");
        return;
    }

    match outcome {
        Ok(module) => {
            *inner.module.lock() = Some(module);
            inner.guard.lock().reset();
            inner.apply(MountState::Ready);
            inner
                .ctx
                .bus
                .publish(inner.event(EventKind::MountReady).with_elapsed(started.elapsed()));
        }
        Err(err) => {
            tracing::warn!(mount = %inner.id, remote = %err.remote(), stage = err.stage().as_str(), error = %err, "mount failed");
            inner.ctx.bus.publish(
                inner
                    .event(EventKind::MountFailed)
                    .with_reason(err.as_message()),
            );
            inner.apply(MountState::Failed(MountFailure::from(err)));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::loader::{
        ComponentFn, EntryFn, LinkedEntries, PollBudget, RawContainer, SharedScope, StaticFetcher,
    };
    use crate::page::{Document, GlobalScope};

    const URL: &str = "http://localhost:4001/remoteEntry.js";

    fn context(entries: LinkedEntries) -> (MountContext, Arc<Document>) {
        let bus = Bus::new(256);
        let document = Arc::new(Document::new());
        let loader = RemoteLoader::assemble(
            document.clone(),
            GlobalScope::new(),
            Arc::new(entries),
            SharedScope::new(),
            PollBudget::new(5, Duration::from_millis(10)),
            bus.clone(),
        );
        let styles = StylesheetInjector::new(document.clone(), Arc::new(StaticFetcher::new()), bus.clone());
        (MountContext { loader, styles, bus }, document)
    }

    fn greeter_entry() -> LinkedEntries {
        let entries = LinkedEntries::new();
        entries.link(
            URL,
            EntryFn::new("toolA", |g: &GlobalScope, _: &_| {
                g.install(
                    "toolA",
                    RawContainer::builder()
                        .expose("./App", || {
                            Ok(Module::component(ComponentFn::new("App", |p: &Props| {
                                match p["name"].as_str() {
                                    Some(name) => Ok(format!("<h1>{name}</h1>")),
                                    None => Err("name is required".into()),
                                }
                            })))
                        })
                        .build(),
                );
                Ok(())
            }),
        );
        entries
    }

    fn boundary(ctx: MountContext) -> MountBoundary {
        MountBoundary::new(
            ctx,
            RemoteDescriptor::new("toolA", "http://localhost:4001").expose("main", "./App"),
            "main".into(),
            "./App".into(),
        )
    }

    #[tokio::test]
    async fn loads_renders_and_recovers_from_render_failure() {
        let (ctx, document) = context(greeter_entry());
        let mount = boundary(ctx);
        assert_eq!(mount.render(&json!({})), SlotView::Idle);

        mount.start();
        assert!(mount.settled().await.is_ready());
        assert_eq!(mount.render(&json!({ "name": "ada" })), SlotView::Rendered("<h1>ada</h1>".into()));

        assert!(matches!(mount.render(&json!({})), SlotView::RenderFailed(_)));
        // Tripped guard keeps the fallback even for valid props.
        assert!(matches!(mount.render(&json!({ "name": "ada" })), SlotView::RenderFailed(_)));
        assert!(mount.reset_render());
        assert!(matches!(mount.render(&json!({ "name": "ada" })), SlotView::Rendered(_)));

        tokio::task::yield_now().await;
        mount.unmount();
        assert_eq!(mount.render(&json!({})), SlotView::Unmounted);
        assert!(document.stylesheets().is_empty());
    }

    #[tokio::test]
    async fn failed_mount_waits_for_explicit_retry() {
        let (ctx, _) = context(LinkedEntries::new());
        let mount = boundary(ctx);
        mount.start();

        let state = mount.settled().await;
        let failure = state.failure().unwrap();
        assert_eq!(failure.remote, "toolA");
        assert_eq!(failure.stage, crate::LoadStage::Script);
        assert_eq!(mount.attempts(), 1);

        mount.start();
        assert_eq!(mount.attempts(), 1);

        mount.retry().unwrap();
        assert_eq!(mount.attempts(), 2);
        assert!(mount.settled().await.failure().is_some());
        assert!(mount.retry().is_ok());
    }

    #[tokio::test]
    async fn back_to_back_retries_launch_one_attempt() {
        let (ctx, _) = context(LinkedEntries::new());
        let mount = boundary(ctx);
        mount.start();
        assert!(mount.settled().await.failure().is_some());

        assert_eq!(mount.retry(), Ok(()));
        assert_eq!(mount.retry(), Err(MountError::NotFailed));
        assert_eq!(mount.attempts(), 2);
        assert_eq!(mount.state(), MountState::Loading(LoadPhase::LoadingScript));

        assert!(mount.settled().await.failure().is_some());
        mount.unmount();
        assert_eq!(mount.retry(), Err(MountError::NotFailed));
        assert_eq!(mount.attempts(), 2);
    }

    #[tokio::test]
    async fn retry_is_rejected_unless_failed() {
        let (ctx, _) = context(greeter_entry());
        let mount = boundary(ctx);
        assert_eq!(mount.retry(), Err(MountError::NotFailed));
    }
}
