//! Remote loading: from an entry URL to an exposed module.
//!
//! ## Contents
//! - [`ScriptLoader`] / [`ScriptHost`] inject the entry once per URL and execute it
//!   ([`LinkedEntries`] is the in-process host)
//! - [`ContainerResolver`] polls the global scope for the remote's container
//! - [`ContainerHandle`] validates and initializes a [`RawContainer`]
//! - [`get_exposed_module`] invokes the module factory
//! - [`RemoteLoader`] chains the steps above, reporting each [`LoadPhase`]
//! - [`SharedScope`] negotiates shared singletons during `init`
//! - [`StylesheetInjector`] manages the remote's stylesheet element
//! - [`Fetch`] network seam ([`HttpFetcher`], [`StaticFetcher`])

mod container;
mod entries;
mod factory;
mod fetch;
mod module;
mod pipeline;
mod resolver;
mod script;
mod shared_scope;
mod stylesheet;
mod version;

pub use container::{
    ContainerBuilder, ContainerHandle, GetFn, InitFn, InitializedContainer, ModuleFactory,
    RawContainer,
};
pub use entries::{EntryFn, EntryManifest, EntryPoint, LinkedEntries};
pub use factory::get_exposed_module;
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{Fetch, StaticFetcher, fetch_json};
pub use module::{Component, ComponentFn, Module, Props, RenderResult, View};
pub use pipeline::{LoadPhase, RemoteLoader};
pub use resolver::{ContainerResolver, PollBudget};
pub use script::{ScriptHost, ScriptLoader};
pub use shared_scope::{
    DeclarationMismatch, ProvidedVersion, SharedDependency, SharedPackageReport, SharedScope,
    SharedValue, check_declarations,
};
pub use stylesheet::StylesheetInjector;
pub use version::{Version, VersionReq};
