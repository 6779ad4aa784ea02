//! # Remote registry.
//!
//! Resolves the configured remotes for the selected environment and validates
//! the naming invariants once, at construction:
//! - every name is a valid identifier;
//! - no two remotes share a name.
//!
//! Collisions are therefore impossible at runtime; the loaders never check.

use std::collections::BTreeMap;

use crate::config::HostConfig;
use crate::error::ConfigError;

use super::descriptor::{RemoteDescriptor, is_valid_remote_name};

/// Validated mapping from remote name to descriptor.
#[derive(Clone, Debug, Default)]
pub struct RemoteRegistry {
    remotes: BTreeMap<String, RemoteDescriptor>,
}

impl RemoteRegistry {
    /// Builds a registry from descriptors, rejecting invalid or duplicate names.
    pub fn new(descriptors: impl IntoIterator<Item = RemoteDescriptor>) -> Result<Self, ConfigError> {
        let mut remotes = BTreeMap::new();
        for d in descriptors {
            if !is_valid_remote_name(&d.remote_name) {
                return Err(ConfigError::InvalidRemoteName {
                    name: d.remote_name,
                });
            }
            if remotes.contains_key(&d.remote_name) {
                return Err(ConfigError::DuplicateRemote {
                    name: d.remote_name,
                });
            }
            remotes.insert(d.remote_name.clone(), d);
        }
        Ok(Self { remotes })
    }

    /// Builds a registry from configuration, resolving each remote's URL for
    /// `cfg.environment`.
    pub fn from_config(cfg: &HostConfig) -> Result<Self, ConfigError> {
        let descriptors = cfg
            .remotes
            .iter()
            .map(|r| {
                let base_url = r.urls.get(&cfg.environment).cloned().ok_or_else(|| {
                    ConfigError::MissingUrl {
                        name: r.name.clone(),
                        environment: cfg.environment.to_string(),
                    }
                })?;
                Ok(RemoteDescriptor {
                    remote_name: r.name.clone(),
                    base_url,
                    entry_path: r.entry_path.clone(),
                    exposed_modules: r.exposes.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(descriptors)
    }

    /// Looks up a remote by name.
    pub fn get(&self, name: &str) -> Option<&RemoteDescriptor> {
        self.remotes.get(name)
    }

    /// Iterates descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RemoteDescriptor> {
        self.remotes.values()
    }

    /// Remote names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.remotes.keys().cloned().collect()
    }

    /// Number of remotes.
    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    /// True if no remote is registered.
    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}
