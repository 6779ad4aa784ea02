//! # Container resolver.
//!
//! After the entry script loads, the remote's container may appear in the
//! [`GlobalScope`] immediately or only after deferred initialization. The
//! resolver polls for it on a fixed budget.
//!
//! ```text
//! attempt 1..=max_attempts:
//!     globals.lookup(remote)? → adapt → ContainerResolved
//!     sleep(interval)
//! → ContainerTimeout after ≈ max_attempts × interval
//! ```
//!
//! ## Rules
//! - The first check happens immediately.
//! - The budget is wall-clock bounded; there is no backoff.
//! - A container that appears but fails shape validation is not retried.

use std::time::Duration;

use tokio::time::{self, Instant};

use crate::error::LoadError;
use crate::events::{Bus, Event, EventKind};
use crate::page::GlobalScope;

use super::container::ContainerHandle;

/// Poll budget for [`ContainerResolver::await_container`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollBudget {
    /// Maximum number of presence checks.
    pub max_attempts: u32,
    /// Delay between checks.
    pub interval: Duration,
}

impl PollBudget {
    /// Creates a budget; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Total time the resolver may wait.
    pub fn total(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

impl Default for PollBudget {
    /// 50 checks every 100ms (5s).
    fn default() -> Self {
        Self {
            max_attempts: 50,
            interval: Duration::from_millis(100),
        }
    }
}

/// Waits for remotes to install their containers.
#[derive(Clone, Debug)]
pub struct ContainerResolver {
    globals: GlobalScope,
    bus: Bus,
}

impl ContainerResolver {
    /// Creates a resolver over `globals`.
    pub fn new(globals: GlobalScope, bus: Bus) -> Self {
        Self { globals, bus }
    }

    /// Polls until `remote` installs a container or the budget runs out.
    ///
    /// `url` is only used to describe a timeout.
    pub async fn await_container(
        &self,
        remote: &str,
        url: &str,
        budget: PollBudget,
    ) -> Result<ContainerHandle, LoadError> {
        let started = Instant::now();
        let max_attempts = budget.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if let Some(raw) = self.globals.lookup(remote) {
                let elapsed = started.elapsed();
                tracing::debug!(remote, attempt, ?elapsed, "container resolved");
                self.bus.publish(
                    Event::new(EventKind::ContainerResolved)
                        .with_remote(remote)
                        .with_attempt(attempt)
                        .with_elapsed(elapsed),
                );
                return ContainerHandle::adapt(remote, raw).map(|h| h.with_bus(self.bus.clone()));
            }
            time::sleep(budget.interval).await;
        }

        let elapsed = started.elapsed();
        let err = LoadError::ContainerTimeout {
            remote: remote.to_string(),
            url: url.to_string(),
            elapsed,
            attempts: max_attempts,
        };
        tracing::warn!(remote, url, attempts = max_attempts, ?elapsed, "container did not appear");
        self.bus.publish(
            Event::new(EventKind::ContainerTimeout)
                .with_remote(remote)
                .with_url(url)
                .with_attempt(max_attempts)
                .with_elapsed(elapsed)
                .with_reason(err.to_string()),
        );
        Err(err)
    }
}
