//! # Factory invoker.
//!
//! Retrieves an exposed module from an initialized container: `get(path)`
//! yields a factory, and calling the factory yields the [`Module`].
//!
//! Either step may fail or panic; both surface as [`LoadError::ModuleFetch`]
//! naming the remote and the path. A path the container does not expose is
//! reported the same way.

use futures::FutureExt;

use crate::error::LoadError;
use crate::events::{Event, EventKind};

use super::container::InitializedContainer;
use super::module::Module;

/// Requests `path` from `container` and invokes the factory.
pub async fn get_exposed_module(
    container: &InitializedContainer,
    path: &str,
) -> Result<Module, LoadError> {
    let remote = container.remote();
    let fail = |reason: String| {
        tracing::warn!(remote, path, %reason, "exposed module unavailable");
        if let Some(bus) = &container.bus {
            bus.publish(
                Event::new(EventKind::ModuleFailed)
                    .with_remote(remote)
                    .with_module(path)
                    .with_reason(reason.as_str()),
            );
        }
        LoadError::ModuleFetch {
            remote: remote.to_string(),
            path: path.to_string(),
            reason,
        }
    };

    let get = container.get.clone();
    let requested = path.to_string();
    let lookup = async move { get(requested).await };
    let factory = match std::panic::AssertUnwindSafe(lookup).catch_unwind().await {
        Ok(Ok(Some(factory))) => factory,
        Ok(Ok(None)) => return Err(fail("module is not exposed".to_string())),
        Ok(Err(reason)) => return Err(fail(reason)),
        Err(panic_err) => {
            return Err(fail(format!(
                "get panicked: {}",
                crate::panic_message(panic_err.as_ref())
            )));
        }
    };

    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(factory)) {
        Ok(Ok(module)) => {
            if let Some(bus) = &container.bus {
                bus.publish(
                    Event::new(EventKind::ModuleResolved)
                        .with_remote(remote)
                        .with_module(path),
                );
            }
            Ok(module)
        }
        Ok(Err(reason)) => Err(fail(reason)),
        Err(panic_err) => Err(fail(format!(
            "factory panicked: {}",
            crate::panic_message(panic_err.as_ref())
        ))),
    }
}

impl InitializedContainer {
    /// Requests `path` and invokes its factory.
    pub async fn get_exposed_module(&self, path: &str) -> Result<Module, LoadError> {
        get_exposed_module(self, path).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::loader::{ContainerHandle, RawContainer, SharedScope};

    async fn initialized(raw: RawContainer) -> InitializedContainer {
        ContainerHandle::adapt("toolA", Arc::new(raw))
            .unwrap()
            .initialize(&SharedScope::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn exposed_module_is_produced() {
        let c = initialized(
            RawContainer::builder()
                .expose("./App", || Ok(Module::value("app")))
                .build(),
        )
        .await;
        let m = c.get_exposed_module("./App").await.unwrap();
        assert_eq!(m.downcast::<&str>().as_deref(), Some(&"app"));
    }

    #[tokio::test]
    async fn missing_path_names_remote_and_path() {
        let c = initialized(RawContainer::builder().build()).await;
        let err = c.get_exposed_module("./Settings").await.unwrap_err();
        match err {
            LoadError::ModuleFetch { remote, path, .. } => {
                assert_eq!(remote, "toolA");
                assert_eq!(path, "./Settings");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_factory_is_contained() {
        let c = initialized(
            RawContainer::builder()
                .expose("./App", || panic!("factory exploded"))
                .build(),
        )
        .await;
        let err = c.get_exposed_module("./App").await.unwrap_err();
        assert!(err.to_string().contains("factory exploded"));
    }

    #[tokio::test]
    async fn get_error_is_reported() {
        let c = initialized(
            RawContainer::new().with_get(|_| async { Err("chunk load failed".to_string()) }),
        )
        .await;
        let err = c.get_exposed_module("./App").await.unwrap_err();
        assert!(err.to_string().contains("chunk load failed"));
    }
}
