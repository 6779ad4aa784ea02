//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   ScriptLoader / MountBoundary ── publish(Event) ──► Bus ──► host listener
//!                                                                  │
//!                                                            SubscriberSet::emit
//!                                                                  │
//!                                                  ┌───────────────┼───────────────┐
//!                                                  ▼               ▼               ▼
//!                                              LogWriter   RemoteStatusTracker   Custom
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** - observe and react to events (logging, metrics, alerts)
//! - **Stateful subscribers** - maintain state derived from events ([`RemoteStatusTracker`])

#[cfg(feature = "logging")]
mod log;
mod set;
mod status;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use status::{RemoteStatus, RemoteStatusTracker};
pub use subscribe::Subscribe;
