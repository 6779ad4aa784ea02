//! # Events emitted while composing remotes.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Load events**: script, container, init and module steps of one load sequence
//! - **Mount events**: state transitions of a mount boundary and its render guard
//! - **Style events**: stylesheet injection and removal
//! - **Runtime events**: shared-scope negotiation and subscriber health
//!
//! The [`Event`] struct carries metadata such as remote, module, URL, reason
//! and elapsed time.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tooldock::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ContainerTimeout)
//!     .with_remote("toolA")
//!     .with_url("http://localhost:4001/remoteEntry.js")
//!     .with_elapsed(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::ContainerTimeout);
//! assert_eq!(ev.remote.as_deref(), Some("toolA"));
//! assert_eq!(ev.elapsed_ms, Some(5000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of composition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Load events ===
    /// A script element was appended for a remote entry.
    ///
    /// Sets: `remote`, `url`
    ScriptInjected,

    /// A script element for the URL already existed; nothing was fetched.
    ///
    /// Sets: `remote`, `url`
    ScriptReused,

    /// The remote entry executed.
    ///
    /// Sets: `remote`, `url`
    ScriptLoaded,

    /// The remote entry could not be fetched or executed.
    ///
    /// Sets: `remote`, `url`, `reason`
    ScriptFailed,

    /// The remote's container appeared in the global scope.
    ///
    /// Sets: `remote`, `attempt` (number of checks), `elapsed_ms`
    ContainerResolved,

    /// The container never appeared within the poll budget.
    ///
    /// Sets: `remote`, `url`, `attempt`, `elapsed_ms`, `reason`
    ContainerTimeout,

    /// `init` completed for a container (published once per container).
    ///
    /// Sets: `remote`
    ContainerInitialized,

    /// The container has no `init`; initialization was skipped.
    ///
    /// Sets: `remote`
    ContainerInitSkipped,

    /// `init` failed.
    ///
    /// Sets: `remote`, `reason`
    ContainerInitFailed,

    /// An exposed module was produced by its factory.
    ///
    /// Sets: `remote`, `module` (exposed path)
    ModuleResolved,

    /// `get` or the factory failed.
    ///
    /// Sets: `remote`, `module` (exposed path), `reason`
    ModuleFailed,

    // === Mount events ===
    /// A mount started (or restarted) its load sequence.
    ///
    /// Sets: `mount`, `remote`, `module`, `attempt`
    MountStarted,

    /// A mount reached `Ready`.
    ///
    /// Sets: `mount`, `remote`, `module`, `elapsed_ms`
    MountReady,

    /// A mount reached `Failed`.
    ///
    /// Sets: `mount`, `remote`, `module`, `reason`
    MountFailed,

    /// A mount was torn down.
    ///
    /// Sets: `mount`, `remote`, `module`
    MountUnmounted,

    /// A loaded component failed during render; the guard shows its fallback.
    ///
    /// Sets: `mount`, `remote`, `module`, `reason`
    RenderFailed,

    /// The render guard was reset and the subtree will render again.
    ///
    /// Sets: `mount`, `remote`, `module`
    RenderReset,

    // === Style events ===
    /// A stylesheet link was inserted.
    ///
    /// Sets: `remote`, `url` (href), `mount`
    StylesheetInjected,

    /// The asset manifest could not be used; the default href was used instead.
    ///
    /// Sets: `remote`, `url` (manifest URL), `reason`
    StylesheetFallback,

    /// A stylesheet link was removed.
    ///
    /// Sets: `remote`, `mount`
    StylesheetRemoved,

    // === Runtime events ===
    /// A singleton was consumed with a requirement its pinned version does not meet.
    ///
    /// Sets: `remote` (consumer), `module` (package), `reason`
    SharedVersionMismatch,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `remote` (subscriber name), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `remote` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Composition event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Remote name, if applicable.
    pub remote: Option<Arc<str>>,
    /// Module id or exposed path, if applicable.
    pub module: Option<Arc<str>>,
    /// Entry URL, stylesheet href or manifest URL.
    pub url: Option<Arc<str>>,
    /// Mount id, if the event belongs to one mount.
    pub mount: Option<u64>,
    /// Human-readable reason (errors, fallbacks, mismatches).
    pub reason: Option<Arc<str>>,
    /// Elapsed time in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
    /// Attempt or check count (starting from 1).
    pub attempt: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            remote: None,
            module: None,
            url: None,
            mount: None,
            reason: None,
            elapsed_ms: None,
            attempt: None,
        }
    }

    /// Attaches a remote name.
    #[inline]
    pub fn with_remote(mut self, remote: impl Into<Arc<str>>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Attaches a module id or exposed path.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches a URL.
    #[inline]
    pub fn with_url(mut self, url: impl Into<Arc<str>>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attaches a mount id.
    #[inline]
    pub fn with_mount(mut self, mount: u64) -> Self {
        self.mount = Some(mount);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.elapsed_ms = Some(ms);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_remote(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_remote(subscriber)
            .with_reason(info)
    }

    /// True for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }

    /// True for events describing a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ScriptFailed
                | EventKind::ContainerTimeout
                | EventKind::ContainerInitFailed
                | EventKind::ModuleFailed
                | EventKind::MountFailed
                | EventKind::RenderFailed
        )
    }
}
