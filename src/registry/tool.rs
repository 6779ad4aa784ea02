//! # Tool registry records.
//!
//! A [`ToolRecord`] is owned by the administration data layer; the composition
//! runtime only derives a [`RemoteDescriptor`] from it and checks whether a
//! principal may open it.

use serde::{Deserialize, Serialize};

use super::descriptor::RemoteDescriptor;

/// Role of a principal inside a tenant, ordered by privilege.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Regular member of a company.
    #[default]
    User,
    /// Administers one company.
    Admin,
    /// Administers every company.
    SuperAdmin,
}

impl Role {
    /// True when this role is at least `required`.
    #[inline]
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

/// Operational status of a tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolStatus {
    /// Available to users.
    #[default]
    Active,
    /// Hidden from users.
    Inactive,
    /// Listed but temporarily unavailable.
    Maintenance,
}

/// Tool registry record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRecord {
    /// Record id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Base URL the tool's remote is served from.
    pub url: String,
    /// Health endpoint.
    #[serde(default)]
    pub health_check_url: Option<String>,
    /// Minimum role needed to open the tool.
    #[serde(default)]
    pub required_role: Role,
    /// Access levels (capabilities) the tool grants; a principal needs one of them.
    #[serde(default)]
    pub access_levels: Vec<String>,
    /// Operational status.
    #[serde(default)]
    pub status: ToolStatus,
    /// Exposed path of the tool's main module.
    #[serde(default = "default_exposed_module")]
    pub exposed_module: String,
}

fn default_exposed_module() -> String {
    "./App".to_string()
}

impl ToolRecord {
    /// Identifier-shaped remote name derived from the record id.
    ///
    /// Non-identifier characters become `_`; a leading digit gets a `_` prefix.
    pub fn remote_name(&self) -> String {
        let mut name: String = self
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
            .collect();
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert(0, '_');
        }
        name
    }

    /// Descriptor exposing the tool's main module as `main`.
    pub fn to_descriptor(&self) -> RemoteDescriptor {
        RemoteDescriptor::new(self.remote_name(), self.url.clone())
            .expose("main", self.exposed_module.clone())
    }

    /// True when the tool can be opened at all.
    pub fn is_available(&self) -> bool {
        self.status == ToolStatus::Active
    }
}
