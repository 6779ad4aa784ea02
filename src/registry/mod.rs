//! Remote registry: which remotes exist and where they are deployed.
//!
//! ## Contents
//! - [`RemoteDescriptor`] one remote: name, base URL, entry path, exposed modules
//! - [`RemoteRegistry`] validated, environment-resolved set of descriptors
//! - [`ToolRecord`] tool registry record (external data) and its conversion
//!   into a descriptor

mod descriptor;
mod remotes;
mod tool;

pub(crate) use descriptor::join_url;
pub use descriptor::{RemoteDescriptor, is_valid_remote_name};
pub use remotes::RemoteRegistry;
pub use tool::{Role, ToolRecord, ToolStatus};
