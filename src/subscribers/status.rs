//! # Per-remote status tracker with sequence-based ordering.
//!
//! Maintains the latest known status of every remote the host has touched,
//! using event sequence numbers to reject out-of-order delivery.
//!
//! ## Architecture
//! ```text
//! Loaders/Mounts ──► Bus ──► SubscriberSet ──► RemoteStatusTracker::on_event()
//!                                                         │
//!                                                         ▼
//!                                            HashMap<remote, {seq, status}>
//! ```
//!
//! ## Rules
//! - Events with `seq <= last_seq` for a remote are **rejected** (stale)
//! - Only load and mount events change the status
//! - Reads (`snapshot`, `status`) are eventually consistent

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Last known status of a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// A load sequence is in progress.
    Loading,
    /// The container is present and initialized.
    Available,
    /// At least one mount rendered it.
    Mounted,
    /// The last attempt failed.
    Failed {
        /// Failure reason.
        reason: String,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    last_seq: u64,
    status: RemoteStatus,
}

/// Stateful subscriber tracking the health of each remote.
#[derive(Default)]
pub struct RemoteStatusTracker {
    state: RwLock<HashMap<String, Entry>>,
}

impl RemoteStatusTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an event if it is newer than the last one seen for its remote.
    ///
    /// Returns `true` when the status changed.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(remote) = ev.remote.as_deref() else {
            return false;
        };
        let next = match ev.kind {
            EventKind::ScriptInjected | EventKind::MountStarted => RemoteStatus::Loading,
            EventKind::ContainerInitialized | EventKind::ContainerInitSkipped => {
                RemoteStatus::Available
            }
            EventKind::MountReady => RemoteStatus::Mounted,
            EventKind::ScriptFailed
            | EventKind::ContainerTimeout
            | EventKind::ContainerInitFailed
            | EventKind::ModuleFailed
            | EventKind::MountFailed => RemoteStatus::Failed {
                reason: ev.reason.as_deref().unwrap_or("unknown").to_string(),
            },
            _ => return false,
        };

        let mut state = self.state.write().await;
        let entry = state.entry(remote.to_string()).or_insert(Entry {
            last_seq: 0,
            status: RemoteStatus::Loading,
        });
        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;
        let changed = entry.status != next;
        entry.status = next;
        changed
    }

    /// Returns the status of one remote, if known.
    pub async fn status(&self, remote: &str) -> Option<RemoteStatus> {
        self.state
            .read()
            .await
            .get(remote)
            .map(|e| e.status.clone())
    }

    /// Returns all known remotes with their status, sorted by name.
    pub async fn snapshot(&self) -> Vec<(String, RemoteStatus)> {
        let state = self.state.read().await;
        let mut all: Vec<(String, RemoteStatus)> = state
            .iter()
            .map(|(name, e)| (name.clone(), e.status.clone()))
            .collect();
        all.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[async_trait]
impl Subscribe for RemoteStatusTracker {
    async fn on_event(&self, event: &Event) {
        self.update(event).await;
    }

    fn name(&self) -> &'static str {
        "RemoteStatusTracker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_events_are_rejected() {
        let tracker = RemoteStatusTracker::new();
        let older = Event::new(EventKind::MountStarted).with_remote("toolA");
        let newer = Event::new(EventKind::MountFailed)
            .with_remote("toolA")
            .with_reason("boom");

        assert!(tracker.update(&newer).await);
        assert!(!tracker.update(&older).await);
        assert_eq!(
            tracker.status("toolA").await,
            Some(RemoteStatus::Failed {
                reason: "boom".into()
            })
        );
    }

    #[tokio::test]
    async fn snapshot_is_sorted() {
        let tracker = RemoteStatusTracker::new();
        tracker
            .update(&Event::new(EventKind::MountReady).with_remote("toolB"))
            .await;
        tracker
            .update(&Event::new(EventKind::ScriptInjected).with_remote("toolA"))
            .await;

        let snap = tracker.snapshot().await;
        assert_eq!(snap[0].0, "toolA");
        assert_eq!(snap[1], ("toolB".to_string(), RemoteStatus::Mounted));
    }

    #[tokio::test]
    async fn events_without_remote_are_ignored() {
        let tracker = RemoteStatusTracker::new();
        assert!(!tracker.update(&Event::new(EventKind::MountReady)).await);
        assert!(tracker.snapshot().await.is_empty());
    }
}
