//! Mount identity and state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{LoadError, LoadStage, RenderError};
use crate::loader::LoadPhase;

static NEXT_MOUNT: AtomicU64 = AtomicU64::new(1);

/// Identity of one mount boundary.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MountId(u64);

impl MountId {
    /// Allocates a fresh id.
    pub(crate) fn next() -> Self {
        MountId(NEXT_MOUNT.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw id.
    pub const fn from_raw(raw: u64) -> Self {
        MountId(raw)
    }

    /// Raw numeric id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mount#{}", self.0)
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mount#{}", self.0)
    }
}

/// Why a mount is in the `Failed` state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountFailure {
    /// Remote that failed.
    pub remote: String,
    /// Stage of the load sequence that failed.
    pub stage: LoadStage,
    /// Message shown in the fallback.
    pub message: String,
    /// Underlying error.
    pub error: LoadError,
}

impl From<LoadError> for MountFailure {
    fn from(error: LoadError) -> Self {
        Self {
            remote: error.remote().to_string(),
            stage: error.stage(),
            message: error.as_message(),
            error,
        }
    }
}

/// Lifecycle state of a mount boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MountState {
    /// Created, not started.
    Idle,
    /// A load sequence is running.
    Loading(LoadPhase),
    /// The module is available.
    Ready,
    /// The load sequence failed; only an explicit retry leaves this state.
    Failed(MountFailure),
}

impl MountState {
    /// True for `Ready` and `Failed`.
    pub fn is_settled(&self) -> bool {
        matches!(self, MountState::Ready | MountState::Failed(_))
    }

    /// True for `Ready`.
    pub fn is_ready(&self) -> bool {
        matches!(self, MountState::Ready)
    }

    /// The failure, if `Failed`.
    pub fn failure(&self) -> Option<&MountFailure> {
        match self {
            MountState::Failed(f) => Some(f),
            _ => None,
        }
    }
}

/// What the host slot shows for a mount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotView {
    /// Nothing started yet.
    Idle,
    /// Loading indicator for the current phase.
    Loading(LoadPhase),
    /// Load fallback with a retry action.
    Failed(MountFailure),
    /// Rendered markup of the remote component.
    Rendered(String),
    /// Render fallback; reset the guard to render again.
    RenderFailed(RenderError),
    /// The mount was torn down.
    Unmounted,
}

impl SlotView {
    /// True when the slot shows a fallback of either kind.
    pub fn is_fallback(&self) -> bool {
        matches!(self, SlotView::Failed(_) | SlotView::RenderFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = MountId::next();
        let b = MountId::next();
        assert_ne!(a, b);
        assert_eq!(MountId::from_raw(a.raw()), a);
    }

    #[test]
    fn failure_names_remote_and_stage() {
        let f = MountFailure::from(LoadError::ContainerInit {
            remote: "toolA".into(),
            reason: "bad scope".into(),
        });
        assert_eq!(f.remote, "toolA");
        assert_eq!(f.stage, LoadStage::Init);
        assert!(MountState::Failed(f).is_settled());
        assert!(!MountState::Loading(LoadPhase::Initializing).is_settled());
    }
}
