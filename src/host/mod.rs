//! Host shell runtime.
//!
//! [`HostBuilder`] wires the page resources, the loader stack and the event
//! subscribers together; [`Host`] hands out mounts.

mod builder;
mod runtime;

pub use builder::HostBuilder;
pub use runtime::Host;
