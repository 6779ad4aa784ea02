//! Page-level shared resources.
//!
//! A remote is brought into the host by mutating two shared resources:
//! - [`Document`]: the page head, holding script and stylesheet elements;
//! - [`GlobalScope`]: the registry keyed by remote name where an executed entry
//!   installs its container.
//!
//! Both are append/check-before-append structures guarded by one lock each, so
//! the check and the mutation happen under a single acquisition.

mod document;
mod globals;

pub use document::{Document, Element, StylesheetRecord};
pub use globals::GlobalScope;
