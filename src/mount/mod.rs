//! Mount boundaries: one remote module in one host slot.
//!
//! ## Contents
//! - [`MountBoundary`] owns a load attempt, a render guard and a stylesheet
//! - [`MountState`], [`MountFailure`] load lifecycle as seen by the slot
//! - [`RenderGuard`] contains failures of a loaded component
//! - [`SlotView`] what the slot shows
//! - [`MountId`] identity used for stylesheet ownership and events

mod boundary;
mod guard;
mod state;

pub(crate) use boundary::MountContext;
pub use boundary::MountBoundary;
pub use guard::RenderGuard;
pub use state::{MountFailure, MountId, MountState, SlotView};
