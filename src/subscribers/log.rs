//! # LogWriter: event logger
//!
//! A subscriber that writes incoming [`Event`]s through `tracing`.
//! Failures are logged at `warn`, progress at `debug`, milestones at `info`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG tooldock: script injected remote="toolA" url="http://localhost:4001/remoteEntry.js"
//!  WARN tooldock: script failed remote="toolA" url="http://localhost:4001/remoteEntry.js" reason="connection refused"
//!  WARN tooldock: mount failed mount=3 remote="toolA" module="main" reason="..."
//!  INFO tooldock: mount ready mount=4 remote="toolB" module="main" elapsed_ms=120
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let remote = e.remote.as_deref().unwrap_or("-");
        let module = e.module.as_deref().unwrap_or("-");
        let url = e.url.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ScriptInjected => {
                tracing::debug!(target: "tooldock", remote, url, "script injected");
            }
            EventKind::ScriptReused => {
                tracing::debug!(target: "tooldock", remote, url, "script reused");
            }
            EventKind::ScriptLoaded => {
                tracing::debug!(target: "tooldock", remote, url, "script loaded");
            }
            EventKind::ScriptFailed => {
                tracing::warn!(target: "tooldock", remote, url, reason, "script failed");
            }
            EventKind::ContainerResolved => {
                tracing::debug!(target: "tooldock", remote, checks = e.attempt, elapsed_ms = e.elapsed_ms, "container resolved");
            }
            EventKind::ContainerTimeout => {
                tracing::warn!(target: "tooldock", remote, url, checks = e.attempt, elapsed_ms = e.elapsed_ms, "container timeout");
            }
            EventKind::ContainerInitialized => {
                tracing::debug!(target: "tooldock", remote, "container initialized");
            }
            EventKind::ContainerInitSkipped => {
                tracing::debug!(target: "tooldock", remote, "container has no init");
            }
            EventKind::ContainerInitFailed => {
                tracing::warn!(target: "tooldock", remote, reason, "container init failed");
            }
            EventKind::ModuleResolved => {
                tracing::debug!(target: "tooldock", remote, module, "module resolved");
            }
            EventKind::ModuleFailed => {
                tracing::warn!(target: "tooldock", remote, module, reason, "module failed");
            }
            EventKind::MountStarted => {
                tracing::debug!(target: "tooldock", mount = e.mount, remote, module, attempt = e.attempt, "mount started");
            }
            EventKind::MountReady => {
                tracing::info!(target: "tooldock", mount = e.mount, remote, module, elapsed_ms = e.elapsed_ms, "mount ready");
            }
            EventKind::MountFailed => {
                tracing::warn!(target: "tooldock", mount = e.mount, remote, module, reason, "mount failed");
            }
            EventKind::MountUnmounted => {
                tracing::debug!(target: "tooldock", mount = e.mount, remote, module, "mount unmounted");
            }
            EventKind::RenderFailed => {
                tracing::warn!(target: "tooldock", mount = e.mount, remote, module, reason, "render failed");
            }
            EventKind::RenderReset => {
                tracing::debug!(target: "tooldock", mount = e.mount, remote, module, "render reset");
            }
            EventKind::StylesheetInjected => {
                tracing::debug!(target: "tooldock", remote, href = url, "stylesheet injected");
            }
            EventKind::StylesheetFallback => {
                tracing::debug!(target: "tooldock", remote, manifest = url, reason, "stylesheet fallback");
            }
            EventKind::StylesheetRemoved => {
                tracing::debug!(target: "tooldock", remote, mount = e.mount, "stylesheet removed");
            }
            EventKind::SharedVersionMismatch => {
                tracing::warn!(target: "tooldock", consumer = remote, package = module, reason, "shared version mismatch");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "tooldock", subscriber = remote, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: "tooldock", subscriber = remote, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
