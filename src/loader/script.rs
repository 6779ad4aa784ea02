//! # Script loader.
//!
//! Loads a remote's entry exactly once per page. The [`Document`] records one
//! script element per URL; a [`ScriptHost`] performs the actual fetch and
//! execution, which must end with the remote installing its container into the
//! [`GlobalScope`] (possibly later, the resolver polls for it).
//!
//! ## Flow
//! ```text
//! load_remote_script(remote, url)
//!   ├─ element with src == url exists → ScriptReused, Ok   (no second fetch)
//!   └─ append element → ScriptInjected
//!        └─ host.load_script(url)
//!             ├─ Ok       → ScriptLoaded, Ok
//!             └─ Err(msg) → remove element, ScriptFailed, LoadError::ScriptLoad
//! ```
//!
//! ## Rules
//! - A successfully loaded element is never removed.
//! - A failed element is removed so that a later attempt fetches again.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LoadError;
use crate::events::{Bus, Event, EventKind};
use crate::page::{Document, GlobalScope};

/// Fetches and executes remote entries.
#[async_trait]
pub trait ScriptHost: Send + Sync + 'static {
    /// Loads the entry at `url`. Executing it installs the container into `globals`.
    async fn load_script(&self, url: &str, globals: &GlobalScope) -> Result<(), String>;
}

/// Appends entry scripts to the document, at most once per URL.
#[derive(Clone)]
pub struct ScriptLoader {
    document: Arc<Document>,
    globals: GlobalScope,
    host: Arc<dyn ScriptHost>,
    bus: Bus,
}

impl ScriptLoader {
    /// Creates a loader over the given page resources.
    pub fn new(
        document: Arc<Document>,
        globals: GlobalScope,
        host: Arc<dyn ScriptHost>,
        bus: Bus,
    ) -> Self {
        Self {
            document,
            globals,
            host,
            bus,
        }
    }

    /// Ensures the entry at `url` for `remote` has been requested.
    pub async fn load_remote_script(&self, remote: &str, url: &str) -> Result<(), LoadError> {
        if !self.document.append_script(url) {
            tracing::debug!(remote, url, "remote entry already requested");
            self.bus.publish(
                Event::new(EventKind::ScriptReused)
                    .with_remote(remote)
                    .with_url(url),
            );
            return Ok(());
        }
        self.bus.publish(
            Event::new(EventKind::ScriptInjected)
                .with_remote(remote)
                .with_url(url),
        );

        match self.host.load_script(url, &self.globals).await {
            Ok(()) => {
                tracing::debug!(remote, url, "remote entry loaded");
                self.bus.publish(
                    Event::new(EventKind::ScriptLoaded)
                        .with_remote(remote)
                        .with_url(url),
                );
                Ok(())
            }
            Err(reason) => {
                self.document.remove_script(url);
                tracing::warn!(remote, url, %reason, "remote entry failed to load");
                self.bus.publish(
                    Event::new(EventKind::ScriptFailed)
                        .with_remote(remote)
                        .with_url(url)
                        .with_reason(reason.as_str()),
                );
                Err(LoadError::ScriptLoad {
                    remote: remote.to_string(),
                    url: url.to_string(),
                    reason,
                })
            }
        }
    }

    /// The page document.
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }
}
