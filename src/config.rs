//! # Host configuration.
//!
//! [`HostConfig`] centralizes the settings of the composition runtime: which
//! remotes exist and where each environment deploys them, the container poll
//! budget, the event bus capacity, the host export container name, the
//! realtime endpoint and the host's shared-dependency declarations.
//!
//! Config is used in three ways:
//! 1. **Registry construction**: `RemoteRegistry::from_config(&cfg)`
//! 2. **Host construction**: `Host::builder(cfg)`
//! 3. **Realtime client**: `RealtimeClient::new(transport, &cfg.realtime)`
//!
//! ## Sources
//! - JSON document (`HostConfig::from_json_str`, `HostConfig::from_path`)
//! - environment overrides (`HostConfig::apply_env`):
//!   - `TOOLDOCK_ENV` = `development` | `staging` | `production` (also `dev`, `prod`)
//!   - `TOOLDOCK_REMOTE_<NAME>_URL` overrides one remote's base URL for every environment
//!   - `TOOLDOCK_REALTIME_URL` overrides the realtime endpoint
//!
//! ## Sentinel values
//! - `poll_attempts = 0` → treated as 1 (a single presence check)
//! - `realtime.request_timeout_ms = 0` → default of 30s
//!
//! # Example
//! ```
//! use tooldock::{Environment, HostConfig};
//!
//! let cfg = HostConfig::from_json_str(r#"{
//!     "environment": "staging",
//!     "remotes": [{
//!         "name": "toolA",
//!         "urls": { "development": "http://localhost:4001", "staging": "https://a.staging.example" },
//!         "exposes": { "main": "./App" }
//!     }]
//! }"#).unwrap();
//!
//! assert_eq!(cfg.environment, Environment::Staging);
//! assert_eq!(cfg.poll_attempts, 50);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::loader::{PollBudget, SharedDependency};

/// Deployment environment selecting each remote's base URL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development servers.
    #[default]
    Development,
    /// Pre-production deployment.
    Staging,
    /// Production deployment.
    Production,
}

impl Environment {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "stage" | "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// One remote as declared in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    /// Remote name; also the global registry key and script dedup key.
    pub name: String,
    /// Base URL (origin) per environment.
    #[serde(default)]
    pub urls: BTreeMap<Environment, String>,
    /// Path of the entry script relative to the base URL.
    #[serde(default = "default_entry_path")]
    pub entry_path: String,
    /// Logical module id → exposed path.
    #[serde(default)]
    pub exposes: BTreeMap<String, String>,
}

fn default_entry_path() -> String {
    "/remoteEntry.js".to_string()
}

/// Realtime client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeConfig {
    /// Realtime endpoint.
    pub url: String,
    /// Acknowledgement timeout for request/response calls, in milliseconds.
    pub request_timeout_ms: u64,
}

impl RealtimeConfig {
    /// Returns the request timeout (`0` → 30s).
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_ms {
            0 => Duration::from_secs(30),
            ms => Duration::from_millis(ms),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// Configuration for the composition runtime.
///
/// ## Field semantics
/// - `environment`: selects which of each remote's `urls` is used
/// - `remotes`: every remote the host may mount
/// - `poll_attempts` / `poll_interval_ms`: container resolver budget
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `exports_name`: global key of the host's own export container
/// - `realtime`: realtime client settings
/// - `shared`: the host's shared-dependency declarations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Selected deployment environment.
    pub environment: Environment,
    /// Declared remotes.
    pub remotes: Vec<RemoteConfig>,
    /// Maximum number of container presence checks.
    pub poll_attempts: u32,
    /// Interval between container presence checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Capacity of the event bus.
    pub bus_capacity: usize,
    /// Global name of the host export container.
    pub exports_name: String,
    /// Realtime client settings.
    pub realtime: RealtimeConfig,
    /// Host shared-dependency declarations, keyed by package name.
    pub shared: BTreeMap<String, SharedDependency>,
}

impl HostConfig {
    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Remote URL overrides replace the base URL for every environment.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("TOOLDOCK_ENV") {
            self.environment = env.parse()?;
        }
        if let Some(url) = lookup("TOOLDOCK_REALTIME_URL") {
            self.realtime.url = url;
        }
        for remote in &mut self.remotes {
            let key = format!("TOOLDOCK_REMOTE_{}_URL", remote.name.to_ascii_uppercase());
            if let Some(url) = lookup(&key) {
                for env in [
                    Environment::Development,
                    Environment::Staging,
                    Environment::Production,
                ] {
                    remote.urls.insert(env, url.clone());
                }
            }
        }
        Ok(())
    }

    /// Returns the container resolver budget.
    #[inline]
    pub fn poll_budget(&self) -> PollBudget {
        PollBudget {
            max_attempts: self.poll_attempts.max(1),
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for HostConfig {
    /// Default configuration:
    ///
    /// - `environment = development`
    /// - `poll_attempts = 50`, `poll_interval_ms = 100` (5s budget)
    /// - `bus_capacity = 1024`
    /// - `exports_name = "host"`
    /// - `realtime.request_timeout_ms = 30000`
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            remotes: Vec::new(),
            poll_attempts: 50,
            poll_interval_ms: 100,
            bus_capacity: 1024,
            exports_name: "host".to_string(),
            realtime: RealtimeConfig::default(),
            shared: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "remotes": [
            { "name": "toolA", "urls": { "development": "http://localhost:4001" }, "exposes": { "main": "./App" } },
            { "name": "toolB", "entryPath": "/entry.js", "urls": { "production": "https://b.example" } }
        ],
        "shared": {
            "react": { "singleton": true, "requiredVersion": "^18.2.0" }
        }
    }"#;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = HostConfig::from_json_str(DOC).unwrap();
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.remotes[0].entry_path, "/remoteEntry.js");
        assert_eq!(cfg.remotes[1].entry_path, "/entry.js");
        assert_eq!(cfg.poll_budget().max_attempts, 50);
        assert_eq!(cfg.poll_budget().interval, Duration::from_millis(100));
        assert_eq!(cfg.realtime.request_timeout(), Duration::from_secs(30));
        assert!(cfg.shared["react"].singleton);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = HostConfig::from_json_str(DOC).unwrap();
        cfg.apply_env_with(|key| match key {
            "TOOLDOCK_ENV" => Some("prod".into()),
            "TOOLDOCK_REMOTE_TOOLA_URL" => Some("https://a.internal".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(
            cfg.remotes[0].urls[&Environment::Production],
            "https://a.internal"
        );
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let mut cfg = HostConfig::default();
        let err = cfg
            .apply_env_with(|key| (key == "TOOLDOCK_ENV").then(|| "qa".to_string()))
            .unwrap_err();
        assert_eq!(err.as_label(), "config_unknown_environment");
    }

    #[test]
    fn zero_attempts_still_checks_once() {
        let cfg = HostConfig {
            poll_attempts: 0,
            ..HostConfig::default()
        };
        assert_eq!(cfg.poll_budget().max_attempts, 1);
    }
}
