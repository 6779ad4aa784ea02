//! # Render guard.
//!
//! Contains failures of a loaded component while it renders. Once a render
//! fails the guard keeps serving the same [`RenderError`] until it is
//! explicitly reset; the load sequence is not involved.
//!
//! ```text
//!           render ok
//!        ┌───────────┐
//!        ▼           │
//!   [Rendering] ─────┘
//!        │ render Err / panic
//!        ▼
//!   [Tripped(err)] ── reset() ──► [Rendering]
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::RenderError;
use crate::loader::{Component, Props, View};

/// Per-mount render failure containment.
#[derive(Debug)]
pub struct RenderGuard {
    remote: String,
    module: String,
    tripped: Option<RenderError>,
    generation: u64,
}

impl RenderGuard {
    /// Creates a guard for `module` of `remote`.
    pub fn new(remote: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            module: module.into(),
            tripped: None,
            generation: 0,
        }
    }

    /// Renders `component`, or returns the stored error if the guard tripped.
    ///
    /// The boolean is `true` when this call tripped the guard.
    pub fn render(
        &mut self,
        component: &dyn Component,
        props: &Props,
    ) -> Result<View, (RenderError, bool)> {
        if let Some(err) = &self.tripped {
            return Err((err.clone(), false));
        }

        let reason = match catch_unwind(AssertUnwindSafe(|| component.render(props))) {
            Ok(Ok(view)) => return Ok(view),
            Ok(Err(e)) => e.to_string(),
            Err(panic_err) => format!("panicked: {}", crate::panic_message(panic_err.as_ref())),
        };

        let err = RenderError {
            remote: self.remote.clone(),
            module: self.module.clone(),
            reason,
        };
        self.tripped = Some(err.clone());
        Err((err, true))
    }

    /// Clears the stored error so the next render runs the component again.
    ///
    /// Returns `false` if the guard was not tripped.
    pub fn reset(&mut self) -> bool {
        if self.tripped.take().is_none() {
            return false;
        }
        self.generation += 1;
        true
    }

    /// The stored error, if tripped.
    pub fn tripped(&self) -> Option<&RenderError> {
        self.tripped.as_ref()
    }

    /// Number of resets so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
