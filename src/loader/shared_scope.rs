//! # Shared scope: the singleton-dependency registry.
//!
//! The host seeds the scope with its own instances of shared packages before
//! any remote is initialized; every container receives the same scope in
//! `init` and resolves its shared packages from it instead of bundling its own.
//!
//! ## Negotiation
//! ```text
//! provide(pkg, version, from, value)     one provider per (pkg, version); first wins
//!
//! consume(pkg, dep, consumer)
//!   ├─ dep.singleton  → pinned instance (highest version at first consumption)
//!   │                   requirement not met → SharedVersionMismatch (warn), still returned
//!   └─ otherwise      → highest provided version matching dep.required_version
//!                       none → SharedScopeError::NoMatchingVersion
//! ```
//!
//! A singleton that ends up duplicated (two rendering runtimes, two routers) is
//! a correctness hazard; `check_declarations` compares host and remote
//! declaration tables so integration tests can assert there is no drift.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::SharedScopeError;
use crate::events::{Bus, Event, EventKind};

use super::version::{Version, VersionReq};

/// A type-erased shared package instance.
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// Shared-dependency declaration exchanged between host and remotes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedDependency {
    /// Exactly one instance may exist across host and remotes.
    pub singleton: bool,
    /// Accepted versions (`*` when empty).
    pub required_version: String,
    /// Provided up front rather than on first use.
    pub eager: bool,
}

impl SharedDependency {
    /// Singleton declaration with a requirement.
    pub fn singleton(required_version: impl Into<String>) -> Self {
        Self {
            singleton: true,
            required_version: required_version.into(),
            eager: false,
        }
    }

    /// Non-singleton declaration with a requirement.
    pub fn versioned(required_version: impl Into<String>) -> Self {
        Self {
            singleton: false,
            required_version: required_version.into(),
            eager: false,
        }
    }

    /// Marks the declaration eager.
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Parsed requirement.
    pub fn requirement(&self) -> Result<VersionReq, SharedScopeError> {
        self.required_version.parse()
    }
}

/// A declared singleton whose requirement differs between host and remote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclarationMismatch {
    /// Package name.
    pub package: String,
    /// Host requirement.
    pub host_required: String,
    /// Remote requirement.
    pub remote_required: String,
}

/// One provided version of a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvidedVersion {
    /// Version string.
    pub version: String,
    /// Who provided it (`host` or a remote name).
    pub from: String,
    /// Whether it was provided eagerly.
    pub eager: bool,
}

/// Version introspection of one package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedPackageReport {
    /// Package name.
    pub package: String,
    /// Provided versions, lowest first.
    pub versions: Vec<ProvidedVersion>,
    /// Version pinned as the singleton instance, if consumed as one.
    pub pinned: Option<String>,
}

struct Provider {
    from: String,
    eager: bool,
    value: SharedValue,
}

#[derive(Default)]
struct Package {
    providers: BTreeMap<Version, Provider>,
    pinned: Option<Version>,
}

/// Process-wide shared-dependency registry.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct SharedScope {
    packages: Arc<RwLock<BTreeMap<String, Package>>>,
    bus: Option<Bus>,
}

impl SharedScope {
    /// Creates an empty scope that reports mismatches only through `tracing`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty scope that also publishes mismatches on `bus`.
    pub fn with_bus(bus: Bus) -> Self {
        Self {
            packages: Arc::default(),
            bus: Some(bus),
        }
    }

    /// Registers an instance of `package` at `version`.
    ///
    /// Returns `Ok(false)` if that version was already provided (the earlier
    /// provider is kept).
    pub fn provide<T>(
        &self,
        package: &str,
        version: &str,
        from: &str,
        eager: bool,
        value: T,
    ) -> Result<bool, SharedScopeError>
    where
        T: Any + Send + Sync,
    {
        self.provide_value(package, version, from, eager, Arc::new(value))
    }

    /// Registers an already type-erased instance.
    pub fn provide_value(
        &self,
        package: &str,
        version: &str,
        from: &str,
        eager: bool,
        value: SharedValue,
    ) -> Result<bool, SharedScopeError> {
        let version: Version = version.parse()?;
        let mut packages = self.packages.write();
        let pkg = packages.entry(package.to_string()).or_default();
        if pkg.providers.contains_key(&version) {
            return Ok(false);
        }
        pkg.providers.insert(
            version,
            Provider {
                from: from.to_string(),
                eager,
                value,
            },
        );
        Ok(true)
    }

    /// Resolves `package` for `consumer` according to `dep`.
    pub fn consume(
        &self,
        package: &str,
        dep: &SharedDependency,
        consumer: &str,
    ) -> Result<SharedValue, SharedScopeError> {
        let req = dep.requirement()?;

        if dep.singleton {
            let (pinned, value) = {
                let mut packages = self.packages.write();
                let pkg = packages
                    .get_mut(package)
                    .filter(|p| !p.providers.is_empty())
                    .ok_or_else(|| SharedScopeError::NotProvided {
                        package: package.to_string(),
                    })?;
                let pinned = match &pkg.pinned {
                    Some(v) => v.clone(),
                    None => {
                        let highest = pkg
                            .providers
                            .keys()
                            .next_back()
                            .cloned()
                            .ok_or_else(|| SharedScopeError::NotProvided {
                                package: package.to_string(),
                            })?;
                        pkg.pinned = Some(highest.clone());
                        highest
                    }
                };
                let value = pkg
                    .providers
                    .get(&pinned)
                    .map(|p| Arc::clone(&p.value))
                    .ok_or_else(|| SharedScopeError::NotProvided {
                        package: package.to_string(),
                    })?;
                (pinned, value)
            };

            if !req.matches(&pinned) {
                let reason = format!("requires {req}, singleton is {pinned}");
                tracing::warn!(package, consumer, %req, %pinned, "shared singleton version mismatch");
                if let Some(bus) = &self.bus {
                    bus.publish(
                        Event::new(EventKind::SharedVersionMismatch)
                            .with_remote(consumer)
                            .with_module(package)
                            .with_reason(reason),
                    );
                }
            }
            return Ok(value);
        }

        let packages = self.packages.read();
        let pkg = packages
            .get(package)
            .ok_or_else(|| SharedScopeError::NotProvided {
                package: package.to_string(),
            })?;
        pkg.providers
            .iter()
            .rev()
            .find(|(v, _)| req.matches(v))
            .map(|(_, p)| Arc::clone(&p.value))
            .ok_or_else(|| SharedScopeError::NoMatchingVersion {
                package: package.to_string(),
                required: req.to_string(),
                available: pkg.providers.keys().map(ToString::to_string).collect(),
            })
    }

    /// Resolves `package` and downcasts it to `T`.
    pub fn consume_as<T>(
        &self,
        package: &str,
        dep: &SharedDependency,
        consumer: &str,
    ) -> Result<Arc<T>, SharedScopeError>
    where
        T: Any + Send + Sync,
    {
        self.consume(package, dep, consumer)?
            .downcast::<T>()
            .map_err(|_| SharedScopeError::TypeMismatch {
                package: package.to_string(),
            })
    }

    /// True if any version of `package` is provided.
    pub fn is_provided(&self, package: &str) -> bool {
        self.packages
            .read()
            .get(package)
            .is_some_and(|p| !p.providers.is_empty())
    }

    /// Every package with its provided versions and pinned singleton version.
    pub fn report(&self) -> Vec<SharedPackageReport> {
        self.packages
            .read()
            .iter()
            .map(|(name, pkg)| SharedPackageReport {
                package: name.clone(),
                versions: pkg
                    .providers
                    .iter()
                    .map(|(v, p)| ProvidedVersion {
                        version: v.to_string(),
                        from: p.from.clone(),
                        eager: p.eager,
                    })
                    .collect(),
                pinned: pkg.pinned.as_ref().map(ToString::to_string),
            })
            .collect()
    }
}

impl std::fmt::Debug for SharedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedScope")
            .field("packages", &self.packages.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Compares host and remote declarations.
///
/// Returns every package declared as a singleton on either side whose
/// `required_version` strings differ.
pub fn check_declarations(
    host: &BTreeMap<String, SharedDependency>,
    remote: &BTreeMap<String, SharedDependency>,
) -> Vec<DeclarationMismatch> {
    host.iter()
        .filter_map(|(package, h)| {
            let r = remote.get(package)?;
            let singleton = h.singleton || r.singleton;
            (singleton && h.required_version != r.required_version).then(|| DeclarationMismatch {
                package: package.clone(),
                host_required: h.required_version.clone(),
                remote_required: r.required_version.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Runtime(&'static str);

    #[test]
    fn singleton_is_pinned_once() {
        let scope = SharedScope::new();
        scope.provide("react", "18.2.0", "host", true, Runtime("host")).unwrap();

        let dep = SharedDependency::singleton("^18.0.0");
        let first = scope.consume_as::<Runtime>("react", &dep, "toolA").unwrap();

        // A later, higher version does not replace the pinned instance.
        scope.provide("react", "18.3.0", "toolB", false, Runtime("toolB")).unwrap();
        let second = scope.consume_as::<Runtime>("react", &dep, "toolB").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, Runtime("host"));
        assert_eq!(scope.report()[0].pinned.as_deref(), Some("18.2.0"));
    }

    #[tokio::test]
    async fn singleton_mismatch_is_reported_not_ignored() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let scope = SharedScope::with_bus(bus);
        scope.provide("react", "17.0.2", "host", true, Runtime("host")).unwrap();

        let value = scope
            .consume_as::<Runtime>("react", &SharedDependency::singleton("^18.0.0"), "toolA")
            .unwrap();
        assert_eq!(*value, Runtime("host"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SharedVersionMismatch);
        assert_eq!(ev.remote.as_deref(), Some("toolA"));
        assert_eq!(ev.module.as_deref(), Some("react"));
    }

    #[test]
    fn non_singleton_picks_highest_match() {
        let scope = SharedScope::new();
        scope.provide("date-fns", "2.29.0", "host", false, 2u8).unwrap();
        scope.provide("date-fns", "2.30.0", "toolA", false, 3u8).unwrap();
        scope.provide("date-fns", "3.0.0", "toolB", false, 4u8).unwrap();

        let got = scope
            .consume_as::<u8>("date-fns", &SharedDependency::versioned("^2.0.0"), "toolC")
            .unwrap();
        assert_eq!(*got, 3);

        let err = scope
            .consume("date-fns", &SharedDependency::versioned("^4.0.0"), "toolC")
            .unwrap_err();
        assert!(matches!(err, SharedScopeError::NoMatchingVersion { .. }));
    }

    #[test]
    fn first_provider_of_a_version_wins() {
        let scope = SharedScope::new();
        assert!(scope.provide("router", "6.4.0", "host", true, 1u8).unwrap());
        assert!(!scope.provide("router", "6.4.0", "toolA", false, 2u8).unwrap());
        let report = scope.report();
        assert_eq!(report[0].versions[0].from, "host");
    }

    #[test]
    fn type_mismatch_and_missing() {
        let scope = SharedScope::new();
        scope.provide("react", "18.2.0", "host", true, 1u8).unwrap();
        let dep = SharedDependency::singleton("*");
        assert!(matches!(
            scope.consume_as::<String>("react", &dep, "toolA"),
            Err(SharedScopeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            scope.consume("vue", &dep, "toolA"),
            Err(SharedScopeError::NotProvided { .. })
        ));
    }

    #[test]
    fn declaration_drift_is_detected() {
        let host = BTreeMap::from([
            ("react".to_string(), SharedDependency::singleton("^18.2.0")),
            ("lodash".to_string(), SharedDependency::versioned("^4.0.0")),
        ]);
        let remote = BTreeMap::from([
            ("react".to_string(), SharedDependency::singleton("^18.0.0")),
            ("lodash".to_string(), SharedDependency::versioned("^4.17.0")),
        ]);
        let mismatches = check_declarations(&host, &remote);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].package, "react");
    }
}
