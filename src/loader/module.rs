//! # Exposed modules and renderable components.
//!
//! A container's factory produces a [`Module`]: either a [`Component`] the
//! host renders into a mount slot, or an arbitrary shared value (the host's own
//! exports are values).
//!
//! [`ComponentFn`] wraps a closure `F: Fn(&Props) -> RenderResult`, so simple
//! remotes need no trait impl.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use tooldock::{ComponentFn, Module};
//!
//! let module = Module::component(ComponentFn::new("Hello", |props| {
//!     Ok(format!("<p>hello {}</p>", props["name"].as_str().unwrap_or("world")))
//! }));
//!
//! let view = module.as_component().unwrap().render(&json!({ "name": "ada" })).unwrap();
//! assert_eq!(view, "<p>hello ada</p>");
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::shared_scope::SharedValue;

/// Properties passed to a component; a JSON object by convention.
pub type Props = serde_json::Value;

/// Rendered markup.
pub type View = String;

/// Outcome of one render call.
pub type RenderResult = Result<View, Box<dyn std::error::Error + Send + Sync>>;

/// A component exposed by a remote.
///
/// `render` may fail or panic; the mount's render guard contains both.
pub trait Component: Send + Sync + 'static {
    /// Component name (for diagnostics).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Renders the component for `props`.
    fn render(&self, props: &Props) -> RenderResult;
}

/// Function-backed component.
pub struct ComponentFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ComponentFn<F>
where
    F: Fn(&Props) -> RenderResult + Send + Sync + 'static,
{
    /// Wraps a render closure.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Component for ComponentFn<F>
where
    F: Fn(&Props) -> RenderResult + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, props: &Props) -> RenderResult {
        (self.f)(props)
    }
}

impl<F> fmt::Debug for ComponentFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFn").field("name", &self.name).finish()
    }
}

/// A module produced by a container factory.
#[derive(Clone)]
pub enum Module {
    /// Renderable component.
    Component(Arc<dyn Component>),
    /// Any other exported value.
    Value(SharedValue),
}

impl Module {
    /// Wraps a component.
    pub fn component(component: impl Component) -> Self {
        Module::Component(Arc::new(component))
    }

    /// Wraps a value.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Module::Value(Arc::new(value))
    }

    /// The component, if this module is one.
    pub fn as_component(&self) -> Option<Arc<dyn Component>> {
        match self {
            Module::Component(c) => Some(Arc::clone(c)),
            Module::Value(_) => None,
        }
    }

    /// The value downcast to `T`, if this module is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Module::Value(v) => Arc::clone(v).downcast::<T>().ok(),
            Module::Component(_) => None,
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Component(c) => f.debug_tuple("Component").field(&c.name()).finish(),
            Module::Value(_) => f.write_str("Value(..)"),
        }
    }
}
