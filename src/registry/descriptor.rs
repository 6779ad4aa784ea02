//! # Remote descriptor.
//!
//! Identifies one foreign application. `remote_name` is both the key the
//! remote's container is registered under in the [`GlobalScope`](crate::GlobalScope)
//! and the dedup key for its stylesheet.

use std::collections::BTreeMap;

/// One remote application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteDescriptor {
    /// Unique identifier-shaped name.
    pub remote_name: String,
    /// Origin the remote is served from (environment resolved).
    pub base_url: String,
    /// Entry script path, conventionally `/remoteEntry.js`.
    pub entry_path: String,
    /// Logical module id → exposed path (e.g. `main` → `./App`).
    pub exposed_modules: BTreeMap<String, String>,
}

impl RemoteDescriptor {
    /// Creates a descriptor with the conventional entry path and no modules.
    pub fn new(remote_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            remote_name: remote_name.into(),
            base_url: base_url.into(),
            entry_path: "/remoteEntry.js".to_string(),
            exposed_modules: BTreeMap::new(),
        }
    }

    /// Adds an exposed module.
    pub fn expose(mut self, module_id: impl Into<String>, path: impl Into<String>) -> Self {
        self.exposed_modules.insert(module_id.into(), path.into());
        self
    }

    /// Overrides the entry path.
    pub fn with_entry_path(mut self, entry_path: impl Into<String>) -> Self {
        self.entry_path = entry_path.into();
        self
    }

    /// Base URL without a trailing slash.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Full URL of the entry script.
    ///
    /// ```
    /// use tooldock::RemoteDescriptor;
    ///
    /// let d = RemoteDescriptor::new("toolA", "http://localhost:4001/");
    /// assert_eq!(d.entry_url(), "http://localhost:4001/remoteEntry.js");
    /// ```
    pub fn entry_url(&self) -> String {
        join_url(self.origin(), &self.entry_path)
    }

    /// Exposed path of a logical module id.
    pub fn exposed_path(&self, module_id: &str) -> Option<&str> {
        self.exposed_modules.get(module_id).map(String::as_str)
    }
}

/// Joins an origin and a path with exactly one `/`.
pub(crate) fn join_url(origin: &str, path: &str) -> String {
    let origin = origin.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}

/// True when `name` can be used as a global property key:
/// `[A-Za-z_$][A-Za-z0-9_$]*`.
pub fn is_valid_remote_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_names() {
        assert!(is_valid_remote_name("toolA"));
        assert!(is_valid_remote_name("_tool$2"));
        assert!(!is_valid_remote_name(""));
        assert!(!is_valid_remote_name("2tool"));
        assert!(!is_valid_remote_name("tool-a"));
        assert!(!is_valid_remote_name("tool a"));
    }

    #[test]
    fn urls_are_joined_once() {
        assert_eq!(join_url("http://h/", "/x"), "http://h/x");
        assert_eq!(join_url("http://h", "x"), "http://h/x");
        let d = RemoteDescriptor::new("toolA", "http://h").with_entry_path("entry.js");
        assert_eq!(d.entry_url(), "http://h/entry.js");
    }
}
