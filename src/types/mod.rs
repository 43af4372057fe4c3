pub mod error;
pub mod hash;
pub mod utils;

pub use error::{
    ErrorCategory, ErrorClassifier, ExternalError, Result, ResultExt, SyncError,
};
pub use hash::{Fingerprinter, normalize_body, page_content_hash, sha256_hex};
pub use utils::{capitalize_first, humanize, key_segment};

// =============================================================================
// Domain Newtypes
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a code entity across runs.
///
/// Derived from kind + fully-qualified name, never from source position,
/// so moving code inside a file keeps the identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identity from kind and qualified name
    pub fn derive(kind: &str, qualified_name: &str) -> Self {
        Self(format!("{}:{}", kind, qualified_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stable logical path of a documentation page (e.g. `Architecture/HLD`).
///
/// Unique within a tree and independent of page titles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(String);

impl PageKey {
    pub const SEPARATOR: char = '/';

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Append a child segment
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}{}{}", self.0, Self::SEPARATOR, segment))
    }

    /// Parent key, `None` for top-level pages
    pub fn parent(&self) -> Option<PageKey> {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(parent, _)| PageKey(parent.to_string()))
    }

    /// Number of segments minus one (top-level pages have depth 0)
    pub fn depth(&self) -> usize {
        self.0.matches(Self::SEPARATOR).count()
    }

    /// First segment; pages sharing it belong to the same top-level subtree
    pub fn root_segment(&self) -> &str {
        self.0
            .split_once(Self::SEPARATOR)
            .map(|(root, _)| root)
            .unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PageKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PageKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for PageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
