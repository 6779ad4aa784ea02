//! # Stylesheet injector.
//!
//! Each remote ships one main stylesheet. Its href is discovered from the
//! remote's build asset manifest (`{base}/asset-manifest.json`, key
//! `files["main.css"]`); when the manifest is missing or has no such key the
//! default `{base}/static/css/main.css` is used.
//!
//! ## Rules
//! - One element per remote, id `"{remote}-stylesheet"`; a second request while
//!   it exists is a no-op.
//! - The element belongs to the mount that inserted it; only that mount removes it.
//! - If the owning mount is gone by the time the manifest arrives, nothing is inserted.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::mount::MountId;
use crate::page::{Document, StylesheetRecord};
use crate::registry::join_url;

use super::fetch::{Fetch, fetch_json};

#[derive(Debug, Default, Deserialize)]
struct AssetManifest {
    #[serde(default)]
    files: HashMap<String, String>,
}

/// Injects and removes remote stylesheets.
#[derive(Clone)]
pub struct StylesheetInjector {
    document: Arc<Document>,
    fetch: Arc<dyn Fetch>,
    bus: Bus,
}

impl StylesheetInjector {
    /// Creates an injector writing into `document`.
    pub fn new(document: Arc<Document>, fetch: Arc<dyn Fetch>, bus: Bus) -> Self {
        Self {
            document,
            fetch,
            bus,
        }
    }

    /// Element id used for `remote`.
    pub fn element_id(remote: &str) -> String {
        format!("{remote}-stylesheet")
    }

    /// Resolves the stylesheet href for a remote served from `base_url`.
    pub async fn resolve_href(&self, remote: &str, base_url: &str) -> String {
        let manifest_url = join_url(base_url, "/asset-manifest.json");
        let fallback = join_url(base_url, "/static/css/main.css");

        let reason = match fetch_json::<AssetManifest>(self.fetch.as_ref(), &manifest_url).await {
            Ok(manifest) => match manifest.files.get("main.css") {
                Some(path) if is_absolute(path) => return path.clone(),
                Some(path) => return join_url(base_url, path),
                None => "manifest has no main.css entry".to_string(),
            },
            Err(e) => e.to_string(),
        };

        tracing::debug!(remote, %manifest_url, %reason, "using default stylesheet path");
        self.bus.publish(
            Event::new(EventKind::StylesheetFallback)
                .with_remote(remote)
                .with_url(manifest_url)
                .with_reason(reason),
        );
        fallback
    }

    /// Inserts the stylesheet for `remote` on behalf of `owner`.
    ///
    /// Returns the inserted record, or `None` if an element already existed or
    /// `liveness` was cancelled before the href was known.
    pub async fn inject(
        &self,
        remote: &str,
        base_url: &str,
        owner: MountId,
        liveness: &CancellationToken,
    ) -> Option<StylesheetRecord> {
        let id = Self::element_id(remote);
        if self.document.stylesheet(&id).is_some() {
            return None;
        }

        let href = self.resolve_href(remote, base_url).await;
        if liveness.is_cancelled() {
            tracing::debug!(remote, mount = owner.raw(), "owner unmounted before stylesheet resolved");
            return None;
        }

        let record = StylesheetRecord {
            link_element_id: id,
            href,
            remote_name: remote.to_string(),
            owner,
        };
        if !self.document.insert_stylesheet(record.clone()) {
            return None;
        }
        self.bus.publish(
            Event::new(EventKind::StylesheetInjected)
                .with_remote(remote)
                .with_url(record.href.as_str())
                .with_mount(owner.raw()),
        );
        Some(record)
    }

    /// Fire-and-forget variant of [`inject`](Self::inject).
    ///
    /// Must be called from within a tokio runtime.
    pub fn ensure_remote_stylesheet(
        &self,
        remote: &str,
        base_url: &str,
        owner: MountId,
        liveness: CancellationToken,
    ) {
        let injector = self.clone();
        let remote = remote.to_string();
        let base_url = base_url.to_string();
        tokio::spawn(async move {
            injector.inject(&remote, &base_url, owner, &liveness).await;
        });
    }

    /// Removes the stylesheet for `remote` if `owner` inserted it.
    pub fn remove(&self, remote: &str, owner: MountId) -> bool {
        let removed = self
            .document
            .remove_stylesheet(&Self::element_id(remote), owner)
            .is_some();
        if removed {
            self.bus.publish(
                Event::new(EventKind::StylesheetRemoved)
                    .with_remote(remote)
                    .with_mount(owner.raw()),
            );
        }
        removed
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://") || path.starts_with("//")
}
