//! # Shared authentication accessor.
//!
//! The host owns the signed-in principal; remotes read it through the
//! [`AuthAccessor`] exposed at `./auth`. All clones observe the same state.
//!
//! ## Rules
//! - `require()` fails with [`AccessError::Unauthenticated`] when nobody is signed in.
//! - `can_open(tool)` needs an available tool, a sufficient role and, unless the
//!   principal is a super admin, one of the tool's access levels (a tool with no
//!   access levels is open to any sufficient role).

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::AccessError;
use crate::registry::{Role, ToolRecord};

/// Signed-in identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Stable user id.
    pub uid: String,
    /// Email address.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Principal plus authorization data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    /// Identity.
    pub principal: Principal,
    /// Role in the tenant.
    pub role: Role,
    /// Granted capabilities (access levels).
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Tenant (company) id.
    pub tenant_id: String,
}

impl AuthContext {
    /// True if `capability` was granted.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.role == Role::SuperAdmin || self.capabilities.contains(capability)
    }

    /// True if this principal may open `tool`.
    pub fn can_open(&self, tool: &ToolRecord) -> bool {
        if !tool.is_available() || !self.role.satisfies(tool.required_role) {
            return false;
        }
        tool.access_levels.is_empty()
            || self.role == Role::SuperAdmin
            || tool
                .access_levels
                .iter()
                .any(|level| self.capabilities.contains(level))
    }
}

/// Shared, observable authentication state.
#[derive(Clone, Debug)]
pub struct AuthAccessor {
    state: Arc<watch::Sender<Option<AuthContext>>>,
}

impl AuthAccessor {
    /// Creates an accessor with nobody signed in.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { state: Arc::new(tx) }
    }

    /// Replaces the signed-in context.
    pub fn sign_in(&self, ctx: AuthContext) {
        tracing::debug!(uid = %ctx.principal.uid, tenant = %ctx.tenant_id, "signed in");
        self.state.send_replace(Some(ctx));
    }

    /// Clears the signed-in context.
    pub fn sign_out(&self) {
        if self.state.send_replace(None).is_some() {
            tracing::debug!("signed out");
        }
    }

    /// Current context, if signed in.
    pub fn current(&self) -> Option<AuthContext> {
        self.state.borrow().clone()
    }

    /// Current context, or [`AccessError::Unauthenticated`].
    pub fn require(&self) -> Result<AuthContext, AccessError> {
        self.current().ok_or(AccessError::Unauthenticated)
    }

    /// Tenant of the signed-in principal.
    pub fn tenant_id(&self) -> Result<String, AccessError> {
        self.state
            .borrow()
            .as_ref()
            .map(|ctx| ctx.tenant_id.clone())
            .ok_or(AccessError::Unauthenticated)
    }

    /// Fails with [`AccessError::Forbidden`] unless `capability` was granted.
    pub fn require_capability(&self, capability: &str) -> Result<AuthContext, AccessError> {
        let ctx = self.require()?;
        if !ctx.has_capability(capability) {
            return Err(AccessError::Forbidden(capability.to_string()));
        }
        Ok(ctx)
    }

    /// True if signed in with `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(|ctx| ctx.has_capability(capability))
    }

    /// True if signed in and allowed to open `tool`.
    pub fn can_open(&self, tool: &ToolRecord) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(|ctx| ctx.can_open(tool))
    }

    /// Receiver notified on sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthContext>> {
        self.state.subscribe()
    }
}

impl Default for AuthAccessor {
    fn default() -> Self {
        Self::new()
    }
}
