//! # Fetching remote resources.
//!
//! [`Fetch`] is the network seam used by the script host (entry documents) and
//! the stylesheet injector (asset manifests).
//!
//! - [`HttpFetcher`] (feature `http`): `reqwest` client, non-2xx → [`FetchError::Status`].
//! - [`StaticFetcher`]: fixed in-process responses, for offline hosts and tests.

use std::collections::HashMap;
#[cfg(feature = "http")]
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use crate::error::FetchError;

/// Retrieves the body at a URL.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    /// Fetches `url`, failing on network errors and non-success statuses.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetches `url` and decodes the body as JSON.
pub async fn fetch_json<T: DeserializeOwned>(fetch: &dyn Fetch, url: &str) -> Result<T, FetchError> {
    let body = fetch.fetch(url).await?;
    serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// HTTP implementation backed by `reqwest`.
#[cfg(feature = "http")]
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    /// Creates a fetcher with a 30s per-request timeout.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a fetcher reusing an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(feature = "http")]
impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// In-process fetcher answering from a fixed table.
///
/// Unknown URLs fail with a network error, as an unreachable server would.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: RwLock<HashMap<String, Result<Bytes, u16>>>,
}

impl StaticFetcher {
    /// Creates a fetcher with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` at `url`.
    pub fn serve(&self, url: impl Into<String>, body: impl Into<Bytes>) -> &Self {
        self.routes.write().insert(url.into(), Ok(body.into()));
        self
    }

    /// Serves a JSON value at `url`.
    pub fn serve_json(&self, url: impl Into<String>, value: &serde_json::Value) -> &Self {
        self.serve(url, value.to_string())
    }

    /// Answers `url` with an error status.
    pub fn fail(&self, url: impl Into<String>, status: u16) -> &Self {
        self.routes.write().insert(url.into(), Err(status));
        self
    }

    /// Removes the route for `url`.
    pub fn forget(&self, url: &str) {
        self.routes.write().remove(url);
    }
}

#[async_trait]
impl Fetch for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        match self.routes.read().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Network {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Doc {
        name: String,
    }

    #[tokio::test]
    async fn static_routes() {
        let fetch = StaticFetcher::new();
        fetch
            .serve_json("http://h/doc.json", &serde_json::json!({ "name": "toolA" }))
            .fail("http://h/missing.json", 404);

        let doc: Doc = fetch_json(&fetch, "http://h/doc.json").await.unwrap();
        assert_eq!(doc.name, "toolA");

        let err = fetch.fetch("http://h/missing.json").await.unwrap_err();
        assert_eq!(err, FetchError::Status { url: "http://h/missing.json".into(), status: 404 });

        let err = fetch.fetch("http://other/").await.unwrap_err();
        assert_eq!(err.as_label(), "fetch_network");
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let fetch = StaticFetcher::new();
        fetch.serve("http://h/bad.json", "not json");
        let err = fetch_json::<Doc>(&fetch, "http://h/bad.json").await.unwrap_err();
        assert_eq!(err.as_label(), "fetch_decode");
    }
}
