//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted while remotes are loaded, mounted,
//! rendered and styled.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ScriptLoader`, `ContainerResolver`, `ContainerHandle`,
//!   `SharedScope`, `StylesheetInjector`, `MountBoundary`, `SubscriberSet` workers.
//! - **Consumers**: the host listener (fans out to `SubscriberSet`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
