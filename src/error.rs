//! Error types used by the composition runtime.
//!
//! This module defines the error enums raised along the remote loading path
//! and by the shared runtime exports:
//!
//! - [`LoadError`]: a remote could not be brought into the host (script,
//!   container, initialization or module stage).
//! - [`RenderError`]: a successfully loaded component failed while rendering.
//! - [`MountError`]: a mount request was rejected before any loading started.
//! - [`RealtimeError`]: the realtime client failed to connect or a request timed out.
//! - [`ConfigError`], [`FetchError`], [`SharedScopeError`], [`AccessError`]:
//!   configuration, transport, shared-dependency and data-access failures.
//!
//! Every type provides `as_label` (stable snake_case, for logs/metrics) and
//! `as_message` (human-readable details).

use std::time::Duration;

use thiserror::Error;

/// Stage of the load sequence at which a [`LoadError`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    /// Fetching and executing the remote entry.
    Script,
    /// Waiting for the remote to register its container.
    Container,
    /// Initializing the container against the shared scope.
    Init,
    /// Retrieving an exposed module and invoking its factory.
    Module,
}

impl LoadStage {
    /// Returns a short stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStage::Script => "script",
            LoadStage::Container => "container",
            LoadStage::Init => "init",
            LoadStage::Module => "module",
        }
    }
}

/// # Errors produced while loading a remote.
///
/// The mount boundary converts each of these into a `Failed` state naming the
/// remote and the stage; they never reach the host's global error handling.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The remote entry script could not be fetched or executed.
    #[error("failed to load remote entry {url} for '{remote}': {reason}")]
    ScriptLoad {
        /// Remote name.
        remote: String,
        /// Entry URL that failed.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The remote never registered its container within the poll budget.
    #[error(
        "remote '{remote}' loaded from {url} did not register its container after {elapsed:?} ({attempts} checks)"
    )]
    ContainerTimeout {
        /// Remote name.
        remote: String,
        /// Entry URL the container was expected from.
        url: String,
        /// Time spent waiting.
        elapsed: Duration,
        /// Number of presence checks performed.
        attempts: u32,
    },

    /// The registered container does not satisfy the container contract.
    #[error("remote '{remote}' registered an invalid container: {reason}")]
    ContainerShape {
        /// Remote name.
        remote: String,
        /// What is missing.
        reason: String,
    },

    /// `init` failed or panicked.
    #[error("failed to initialize container of remote '{remote}': {reason}")]
    ContainerInit {
        /// Remote name.
        remote: String,
        /// Underlying failure.
        reason: String,
    },

    /// `get` or the module factory failed.
    #[error("failed to get module '{path}' from remote '{remote}': {reason}")]
    ModuleFetch {
        /// Remote name.
        remote: String,
        /// Exposed path that was requested.
        path: String,
        /// Underlying failure.
        reason: String,
    },
}

impl LoadError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tooldock::LoadError;
    ///
    /// let err = LoadError::ScriptLoad {
    ///     remote: "toolA".into(),
    ///     url: "http://localhost:4001/remoteEntry.js".into(),
    ///     reason: "connection refused".into(),
    /// };
    /// assert_eq!(err.as_label(), "load_script_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::ScriptLoad { .. } => "load_script_failed",
            LoadError::ContainerTimeout { .. } => "load_container_timeout",
            LoadError::ContainerShape { .. } => "load_container_shape",
            LoadError::ContainerInit { .. } => "load_container_init_failed",
            LoadError::ModuleFetch { .. } => "load_module_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoadError::ScriptLoad { remote, url, reason } => {
                format!("could not load '{remote}' from {url}: {reason}")
            }
            LoadError::ContainerTimeout {
                remote,
                url,
                elapsed,
                ..
            } => format!("'{remote}' ({url}) did not start within {elapsed:?}"),
            LoadError::ContainerShape { remote, reason } => {
                format!("'{remote}' is not a valid remote: {reason}")
            }
            LoadError::ContainerInit { remote, reason } => {
                format!("'{remote}' failed to initialize: {reason}")
            }
            LoadError::ModuleFetch {
                remote,
                path,
                reason,
            } => format!("'{remote}' could not provide {path}: {reason}"),
        }
    }

    /// Stage of the load sequence this error belongs to.
    pub fn stage(&self) -> LoadStage {
        match self {
            LoadError::ScriptLoad { .. } => LoadStage::Script,
            LoadError::ContainerTimeout { .. } | LoadError::ContainerShape { .. } => {
                LoadStage::Container
            }
            LoadError::ContainerInit { .. } => LoadStage::Init,
            LoadError::ModuleFetch { .. } => LoadStage::Module,
        }
    }

    /// Name of the remote that failed.
    pub fn remote(&self) -> &str {
        match self {
            LoadError::ScriptLoad { remote, .. }
            | LoadError::ContainerTimeout { remote, .. }
            | LoadError::ContainerShape { remote, .. }
            | LoadError::ContainerInit { remote, .. }
            | LoadError::ModuleFetch { remote, .. } => remote,
        }
    }
}

/// A loaded component failed while rendering.
///
/// Caught by the render guard one level below the load sequence; it has its own
/// retry path (remount the subtree) that does not touch the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote '{remote}' failed to render '{module}': {reason}")]
pub struct RenderError {
    /// Remote name.
    pub remote: String,
    /// Module id that was rendering.
    pub module: String,
    /// Error message or panic payload.
    pub reason: String,
}

impl RenderError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "render_failed"
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        format!("'{}' crashed while rendering: {}", self.remote, self.reason)
    }
}

/// Errors returned when requesting a mount.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MountError {
    /// No remote with this name is registered.
    #[error("unknown remote '{remote}'")]
    UnknownRemote {
        /// Requested remote name.
        remote: String,
    },

    /// The remote does not expose this module id.
    #[error("remote '{remote}' does not expose module '{module}'")]
    UnknownModule {
        /// Remote name.
        remote: String,
        /// Requested module id.
        module: String,
    },

    /// The descriptor's name cannot be used as a global registry key, or is
    /// the key of the host exports container.
    #[error("remote name '{remote}' cannot be mounted")]
    InvalidRemote {
        /// Rejected remote name.
        remote: String,
    },

    /// `retry` was called while the mount was not in the `Failed` state.
    #[error("mount is not in a failed state")]
    NotFailed,
}

impl MountError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            MountError::UnknownRemote { .. } => "mount_unknown_remote",
            MountError::UnknownModule { .. } => "mount_unknown_module",
            MountError::InvalidRemote { .. } => "mount_invalid_remote",
            MountError::NotFailed => "mount_not_failed",
        }
    }
}

/// Errors produced by the realtime client.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// An operation needed a connection and none was established.
    #[error("realtime client is not connected")]
    NotConnected,

    /// The transport refused the connection.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Realtime endpoint.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// No acknowledgement arrived within the request timeout.
    #[error("request '{event}' timed out after {timeout:?}")]
    RequestTimeout {
        /// Event name that was emitted.
        event: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The transport failed while sending.
    #[error("realtime transport error: {reason}")]
    Transport {
        /// Underlying failure.
        reason: String,
    },

    /// The connection was closed before an acknowledgement arrived.
    #[error("realtime connection closed")]
    Closed,
}

impl RealtimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RealtimeError::NotConnected => "realtime_not_connected",
            RealtimeError::Connect { .. } => "realtime_connect_failed",
            RealtimeError::RequestTimeout { .. } => "realtime_request_timeout",
            RealtimeError::Transport { .. } => "realtime_transport",
            RealtimeError::Closed => "realtime_closed",
        }
    }

    /// Returns `true` for request timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RealtimeError::RequestTimeout { .. })
    }
}

/// Configuration and registry validation errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A remote name cannot be used as a global registry key.
    #[error("invalid remote name '{name}': must be an identifier")]
    InvalidRemoteName {
        /// Offending name.
        name: String,
    },

    /// Two remotes share a name.
    #[error("remote '{name}' is declared more than once")]
    DuplicateRemote {
        /// Duplicated name.
        name: String,
    },

    /// A remote uses the global key reserved for the host exports.
    #[error("remote '{name}' collides with the host exports container")]
    ReservedName {
        /// Colliding name.
        name: String,
    },

    /// A remote has no base URL for the selected environment.
    #[error("remote '{name}' has no URL for environment '{environment}'")]
    MissingUrl {
        /// Remote name.
        name: String,
        /// Selected environment.
        environment: String,
    },

    /// Unknown environment name.
    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),

    /// Configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidRemoteName { .. } => "config_invalid_remote_name",
            ConfigError::DuplicateRemote { .. } => "config_duplicate_remote",
            ConfigError::ReservedName { .. } => "config_reserved_name",
            ConfigError::MissingUrl { .. } => "config_missing_url",
            ConfigError::UnknownEnvironment(_) => "config_unknown_environment",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Io(_) => "config_io",
        }
    }
}

/// Errors produced by a [`Fetch`](crate::Fetch) implementation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete.
    #[error("request to {url} failed: {reason}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body could not be decoded.
    #[error("invalid response from {url}: {reason}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder message.
        reason: String,
    },
}

impl FetchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FetchError::Network { .. } => "fetch_network",
            FetchError::Status { .. } => "fetch_status",
            FetchError::Decode { .. } => "fetch_decode",
        }
    }
}

/// Errors produced by shared-dependency negotiation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedScopeError {
    /// Nobody provided the package.
    #[error("shared package '{package}' is not provided")]
    NotProvided {
        /// Package name.
        package: String,
    },

    /// No provided version satisfies the requirement.
    #[error("no provided version of '{package}' satisfies {required}; available: {available:?}")]
    NoMatchingVersion {
        /// Package name.
        package: String,
        /// Requirement that could not be met.
        required: String,
        /// Versions that are provided.
        available: Vec<String>,
    },

    /// The provided value has a different type than requested.
    #[error("shared package '{package}' has an unexpected type")]
    TypeMismatch {
        /// Package name.
        package: String,
    },

    /// A version or requirement string could not be parsed.
    #[error("invalid version '{input}'")]
    InvalidVersion {
        /// Offending input.
        input: String,
    },
}

/// Errors produced by the shared auth accessor and the tenant repository.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No principal is signed in.
    #[error("not authenticated")]
    Unauthenticated,

    /// The record belongs to a different tenant.
    #[error("record '{id}' in '{collection}' belongs to another tenant")]
    ForeignTenant {
        /// Collection name.
        collection: String,
        /// Record id.
        id: String,
    },

    /// The principal lacks a required capability.
    #[error("missing capability '{0}'")]
    Forbidden(String),

    /// The document store failed.
    #[error("document store error: {0}")]
    Store(String),
}

impl AccessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated => "access_unauthenticated",
            AccessError::ForeignTenant { .. } => "access_foreign_tenant",
            AccessError::Forbidden(_) => "access_forbidden",
            AccessError::Store(_) => "access_store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_map_to_stages() {
        let timeout = LoadError::ContainerTimeout {
            remote: "toolA".into(),
            url: "http://localhost:4001/remoteEntry.js".into(),
            elapsed: Duration::from_secs(5),
            attempts: 50,
        };
        assert_eq!(timeout.stage(), LoadStage::Container);
        assert_eq!(timeout.remote(), "toolA");

        let msg = timeout.to_string();
        assert!(msg.contains("toolA"));
        assert!(msg.contains("5s"));

        let module = LoadError::ModuleFetch {
            remote: "toolA".into(),
            path: "./App".into(),
            reason: "factory panicked".into(),
        };
        assert_eq!(module.stage(), LoadStage::Module);
        assert_ne!(module.as_label(), timeout.as_label());
    }

    #[test]
    fn realtime_timeout_is_detected() {
        let err = RealtimeError::RequestTimeout {
            event: "getUsers".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.is_timeout());
        assert!(!RealtimeError::Closed.is_timeout());
    }
}
