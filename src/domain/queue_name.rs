//! Type-safe queue name.
//!
//! [`QueueName`] is a newtype around the registry-generated name so queue
//! names cannot be confused with exchange names or other strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Name of a registry-tracked broker queue.
///
/// Produced by [`crate::registry::QueueRegistry::generate_and_register`];
/// the registry, not the worker, guarantees uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    /// Wraps a registry-provided name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for QueueName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for QueueName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner() {
        let name = QueueName::new("relay.q.abc");
        assert_eq!(name.to_string(), "relay.q.abc");
        assert_eq!(name.as_str(), "relay.q.abc");
    }

    #[test]
    fn serializes_as_plain_string() {
        let name = QueueName::from("relay.q.1");
        let Ok(json) = serde_json::to_string(&name) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"relay.q.1\"");
    }

    #[test]
    fn hash_works_in_hashset() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(QueueName::from("a"));
        set.insert(QueueName::from("a"));
        set.insert(QueueName::from("b"));
        assert_eq!(set.len(), 2);
    }
}
